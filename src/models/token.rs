use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Canonical record reconciled from every provider. Only the aggregator
/// builds these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSnapshot {
    pub address: String,                 // Token mint address
    pub metadata: TokenMetadata,
    pub market_data: MarketData,
    pub on_chain_metrics: OnChainMetrics,
    pub security: SecurityInfo,
    #[serde(default)]
    pub data_gaps: Vec<DataGap>,         // Providers that degraded to absent
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply: String,            // Raw units, kept as reported
    pub creator: Option<String>,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub tags: Vec<String>,
    pub verified: bool,
    pub social: SocialLinks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub twitter: Option<String>,
    pub website: Option<String>,
}

impl SocialLinks {
    pub fn is_empty(&self) -> bool {
        self.twitter.is_none() && self.website.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub price: f64,
    pub price_change_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub volume_24h: f64,
    pub buy_volume_24h: f64,
    pub sell_volume_24h: f64,
    pub total_buys_24h: u64,
    pub total_sells_24h: u64,
    pub unique_buyers_24h: u64,
    pub unique_sellers_24h: u64,
    pub liquidity_usd: f64,
    pub fully_diluted_valuation: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonding_progress: Option<f64>,   // 0-100, None when no bonding curve is known
    pub dex: DexInfo,
    pub volume_sources: VolumeSources,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexInfo {
    pub active_pairs: u64,
    pub active_dexes: u64,
}

/// Raw 24h volume as reported by each source, kept for audit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSources {
    pub primary: f64,
    pub analytics: f64,
    pub pair_stats: f64,
}

impl VolumeSources {
    pub fn max(&self) -> f64 {
        self.primary.max(self.analytics).max(self.pair_stats)
    }

    /// Relative spread between the largest and smallest non-zero source.
    /// Zero when fewer than two sources report volume.
    pub fn divergence(&self) -> f64 {
        let reported: Vec<f64> = [self.primary, self.analytics, self.pair_stats]
            .into_iter()
            .filter(|v| *v > 0.0)
            .collect();
        if reported.len() < 2 {
            return 0.0;
        }
        let max = reported.iter().cloned().fold(f64::MIN, f64::max);
        let min = reported.iter().cloned().fold(f64::MAX, f64::min);
        (max - min) / max
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChainMetrics {
    pub holders: HolderMetrics,
    pub activity: ActivityMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderMetrics {
    pub total: u64,
    pub top10_percent: f64,
    pub top50_percent: f64,
    pub distribution: HolderDistribution,
    pub acquisition: HolderAcquisition,
    pub change: HolderChanges,
}

/// Holder counts by wealth tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HolderDistribution {
    pub whales: u64,
    pub sharks: u64,
    pub dolphins: u64,
    pub fish: u64,
    pub octopus: u64,
    pub crabs: u64,
    pub shrimps: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HolderAcquisition {
    pub swap: u64,
    pub transfer: u64,
    pub airdrop: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderChange {
    pub change: i64,
    pub change_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HolderChanges {
    #[serde(rename = "5m")]
    pub m5: HolderChange,
    #[serde(rename = "1h")]
    pub h1: HolderChange,
    #[serde(rename = "6h")]
    pub h6: HolderChange,
    #[serde(rename = "24h")]
    pub h24: HolderChange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetrics {
    pub transactions_24h: u64,
    pub large_transactions_24h: u64, // Not computed yet, always 0
    pub new_holders_24h: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityInfo {
    pub verified_creator: bool,
    pub contract_verified: bool,
    pub mint_authority_revoked: bool,
    pub warnings: Vec<String>,
}

/// A provider whose data was missing from this snapshot, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataGap {
    pub provider: String,
    pub reason: String,
}

impl DataGap {
    pub fn new(provider: &str, error: &ProviderError) -> Self {
        Self {
            provider: provider.to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_divergence_ignores_silent_sources() {
        let single = VolumeSources { primary: 0.0, analytics: 0.0, pair_stats: 50_000.0 };
        assert_eq!(single.divergence(), 0.0);
        assert_eq!(single.max(), 50_000.0);

        let spread = VolumeSources { primary: 10_000.0, analytics: 30_000.0, pair_stats: 50_000.0 };
        assert!((spread.divergence() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_bonding_progress_is_omitted() {
        let market = MarketData::default();
        let json = serde_json::to_value(&market).unwrap();
        assert!(json.get("bondingProgress").is_none());
        assert!(json.get("marketCapRank").is_none());

        let market = MarketData { bonding_progress: Some(0.0), ..MarketData::default() };
        let json = serde_json::to_value(&market).unwrap();
        assert_eq!(json["bondingProgress"], 0.0);
    }
}
