//! Provider adapters.
//!
//! One client per external data source. Each capability is a narrow trait so
//! the aggregator never depends on a concrete HTTP client, and every call
//! fails independently with a [`ProviderError`]. Adapters never retry.

pub mod alchemy;
pub mod completion;
pub mod moralis;
pub mod solanafm;
pub mod solscan;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

use crate::error::ProviderError;
use crate::models::ChatMessage;

use self::alchemy::SymbolPrice;
use self::moralis::{BondingStatus, MoralisPairStats, MoralisTokenAnalytics, MoralisTokenHolders};
use self::solanafm::SolanaFmTokenInfo;
use self::solscan::SolscanTokenInfo;

/// Metadata provider A. `Ok(None)` means the provider has no such token.
#[async_trait]
pub trait PrimaryMetadataProvider: Send + Sync {
    async fn token_info(&self, address: &str) -> Result<Option<SolscanTokenInfo>, ProviderError>;
}

/// Metadata provider B. `Ok(None)` means the provider has no such token.
#[async_trait]
pub trait SecondaryMetadataProvider: Send + Sync {
    async fn token_info(&self, address: &str) -> Result<Option<SolanaFmTokenInfo>, ProviderError>;
}

#[async_trait]
pub trait HolderProvider: Send + Sync {
    async fn holders(&self, address: &str) -> Result<MoralisTokenHolders, ProviderError>;
}

#[async_trait]
pub trait AnalyticsProvider: Send + Sync {
    async fn analytics(&self, address: &str) -> Result<MoralisTokenAnalytics, ProviderError>;
}

#[async_trait]
pub trait PairStatsProvider: Send + Sync {
    async fn pair_stats(&self, address: &str) -> Result<MoralisPairStats, ProviderError>;
}

/// Most tokens have no bonding curve, so `NotFound` is the common answer.
#[async_trait]
pub trait BondingStatusProvider: Send + Sync {
    async fn bonding_status(&self, address: &str) -> Result<BondingStatus, ProviderError>;
}

#[async_trait]
pub trait SymbolPriceProvider: Send + Sync {
    async fn symbol_prices(&self, symbols: &[String]) -> Result<Vec<SymbolPrice>, ProviderError>;
}

/// Opaque text generation collaborator.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(
        &self,
        system_prompt: &str,
        history: &[ChatMessage],
    ) -> anyhow::Result<String>;
}

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))
}

/// Maps the status line to a [`ProviderError`] and decodes the body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    provider: &str,
) -> Result<T, ProviderError> {
    let status = response.status();
    match status {
        StatusCode::NOT_FOUND => return Err(ProviderError::NotFound),
        StatusCode::TOO_MANY_REQUESTS => {
            warn!("{} rate limited the request", provider);
            return Err(ProviderError::RateLimited);
        }
        s if !s.is_success() => {
            let error_text = response.text().await.unwrap_or_default();
            warn!("{} API error: {} - {}", provider, status, error_text);
            return Err(ProviderError::Unavailable(format!("{} - {}", status, error_text)));
        }
        _ => {}
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        warn!("Failed to parse {} response: {}", provider, e);
        ProviderError::Malformed(e.to_string())
    })
}

/// Lenient field decoders. Providers are inconsistent about sending numbers
/// as JSON numbers or strings, and about `null` versus missing.
pub(crate) mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn f64_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        })
    }

    pub fn opt_f64_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn opt_string_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn bool_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        })
    }
}
