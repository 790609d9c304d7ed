use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price of one market symbol as of the last refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSymbolSnapshot {
    pub symbol: String,
    pub price: f64,
    pub currency: String,
    pub last_updated_at: DateTime<Utc>, // Reported by the provider
    pub fetched_at: DateTime<Utc>,      // When this process fetched it
}

impl MarketSymbolSnapshot {
    /// Age of the price relative to `now`, never negative.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        let age = now.signed_duration_since(self.last_updated_at);
        if age < chrono::Duration::zero() {
            chrono::Duration::zero()
        } else {
            age
        }
    }
}
