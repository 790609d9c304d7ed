//! Moralis API Client for token holder, trading and bonding data
//!
//! Provides access to the Moralis endpoints used when reconciling a token:
//! - /token/mainnet/holders/{address} - Holder counts, distribution and changes
//! - /api/v2.2/tokens/{address}/analytics - Buy/sell volume and trader counts
//! - /token/mainnet/{address}/pairs/stats - Liquidity and swap stats across pairs
//! - /token/mainnet/{address}/bonding-status - Pump.fun bonding curve progress

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{
    de, http_client, read_json, AnalyticsProvider, BondingStatusProvider, HolderProvider,
    PairStatsProvider,
};
use crate::error::ProviderError;

const MORALIS_SOLANA_BASE_URL: &str = "https://solana-gateway.moralis.io";
const MORALIS_DEEP_INDEX_URL: &str = "https://deep-index.moralis.io/api/v2.2";

// ============================================================================
// Response Structures
// ============================================================================

/// Response for the holder stats endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoralisTokenHolders {
    #[serde(default)]
    pub total_holders: Option<u64>,
    #[serde(default)]
    pub holders_by_acquisition: Option<HoldersByAcquisition>,
    #[serde(default)]
    pub holder_change: Option<HolderChangeWindows>,
    #[serde(default)]
    pub holder_distribution: Option<HolderDistributionBuckets>,
    #[serde(default)]
    pub holder_supply: Option<HolderSupplyBuckets>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct HoldersByAcquisition {
    #[serde(default)]
    pub swap: u64,
    #[serde(default)]
    pub transfer: u64,
    #[serde(default)]
    pub airdrop: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderChangeEntry {
    #[serde(default)]
    pub change: i64,
    #[serde(default, deserialize_with = "de::f64_lenient")]
    pub change_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct HolderChangeWindows {
    #[serde(rename = "5min", alias = "5m", default)]
    pub m5: Option<HolderChangeEntry>,
    #[serde(rename = "1h", default)]
    pub h1: Option<HolderChangeEntry>,
    #[serde(rename = "6h", default)]
    pub h6: Option<HolderChangeEntry>,
    #[serde(rename = "24h", default)]
    pub h24: Option<HolderChangeEntry>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct HolderDistributionBuckets {
    #[serde(default)]
    pub whales: u64,
    #[serde(default)]
    pub sharks: u64,
    #[serde(default)]
    pub dolphins: u64,
    #[serde(default)]
    pub fish: u64,
    #[serde(default)]
    pub octopus: u64,
    #[serde(default)]
    pub crabs: u64,
    #[serde(default)]
    pub shrimps: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderSupplyEntry {
    #[serde(default, deserialize_with = "de::opt_string_lenient")]
    pub supply: Option<String>,
    #[serde(default, deserialize_with = "de::f64_lenient")]
    pub supply_percent: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HolderSupplyBuckets {
    #[serde(default)]
    pub top10: Option<HolderSupplyEntry>,
    #[serde(default)]
    pub top25: Option<HolderSupplyEntry>,
    #[serde(default)]
    pub top50: Option<HolderSupplyEntry>,
    #[serde(default)]
    pub top100: Option<HolderSupplyEntry>,
}

/// Figures reported for the analytics windows (5m/1h/6h/24h)
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct AnalyticsWindows {
    #[serde(rename = "5m", default, deserialize_with = "de::f64_lenient")]
    pub m5: f64,
    #[serde(rename = "1h", default, deserialize_with = "de::f64_lenient")]
    pub h1: f64,
    #[serde(rename = "6h", default, deserialize_with = "de::f64_lenient")]
    pub h6: f64,
    #[serde(rename = "24h", default, deserialize_with = "de::f64_lenient")]
    pub h24: f64,
}

/// Response for the deep-index token analytics endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoralisTokenAnalytics {
    #[serde(default)]
    pub token_address: String,
    #[serde(default)]
    pub total_buy_volume: AnalyticsWindows,
    #[serde(default)]
    pub total_sell_volume: AnalyticsWindows,
    #[serde(default)]
    pub total_buyers: AnalyticsWindows,
    #[serde(default)]
    pub total_sellers: AnalyticsWindows,
    #[serde(default)]
    pub total_buys: AnalyticsWindows,
    #[serde(default)]
    pub total_sells: AnalyticsWindows,
    #[serde(default)]
    pub total_liquidity_usd: Option<String>,
    #[serde(default)]
    pub total_fully_diluted_valuation: Option<String>,
}

impl MoralisTokenAnalytics {
    /// Get 24h buy plus sell volume in USD
    pub fn volume_24h(&self) -> f64 {
        self.total_buy_volume.h24 + self.total_sell_volume.h24
    }

    /// Get liquidity in USD
    pub fn liquidity_usd(&self) -> f64 {
        self.total_liquidity_usd
            .as_ref()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    /// Get fully diluted valuation in USD
    pub fn fully_diluted_valuation(&self) -> f64 {
        self.total_fully_diluted_valuation
            .as_ref()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// Figures reported for the pair stats windows (5min/1h/4h/24h)
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct PairStatsWindows {
    #[serde(rename = "5min", default, deserialize_with = "de::f64_lenient")]
    pub m5: f64,
    #[serde(rename = "1h", default, deserialize_with = "de::f64_lenient")]
    pub h1: f64,
    #[serde(rename = "4h", default, deserialize_with = "de::f64_lenient")]
    pub h4: f64,
    #[serde(rename = "24h", default, deserialize_with = "de::f64_lenient")]
    pub h24: f64,
}

/// Response for the pair stats endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoralisPairStats {
    #[serde(default, deserialize_with = "de::f64_lenient")]
    pub total_liquidity_usd: f64,
    #[serde(default)]
    pub total_active_pairs: u64,
    #[serde(default)]
    pub total_active_dexes: u64,
    #[serde(default)]
    pub total_buyers: PairStatsWindows,
    #[serde(default)]
    pub total_buy_volume: PairStatsWindows,
    #[serde(default)]
    pub total_sellers: PairStatsWindows,
    #[serde(default)]
    pub total_sell_volume: PairStatsWindows,
    #[serde(default)]
    pub total_swaps: PairStatsWindows,
    #[serde(default)]
    pub total_volume: PairStatsWindows,
}

/// Response for the bonding status endpoint. Graduated tokens report a
/// timestamp instead of (or alongside) progress.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BondingStatus {
    #[serde(default, alias = "bondingProgress", deserialize_with = "de::opt_f64_lenient")]
    pub progress: Option<f64>,
    #[serde(default)]
    pub mint: Option<String>,
    #[serde(default)]
    pub graduated_at: Option<String>,
}

impl BondingStatus {
    /// Get bonding progress (0-100), forced to 100 once graduated
    pub fn effective_progress(&self) -> Option<f64> {
        if self.graduated_at.is_some() {
            return Some(100.0);
        }
        self.progress.map(|p| p.clamp(0.0, 100.0))
    }
}

// ============================================================================
// Moralis Client
// ============================================================================

#[derive(Debug, Clone)]
pub struct MoralisClient {
    api_key: String,
    solana_base_url: String,
    deep_index_url: String,
    client: Client,
}

impl MoralisClient {
    /// Create a new Moralis client
    pub fn new(
        api_key: &str,
        solana_base_url: Option<&str>,
        deep_index_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            solana_base_url: solana_base_url
                .unwrap_or(MORALIS_SOLANA_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            deep_index_url: deep_index_url
                .unwrap_or(MORALIS_DEEP_INDEX_URL)
                .trim_end_matches('/')
                .to_string(),
            client: http_client(timeout)?,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        read_json(response, "Moralis").await
    }
}

#[async_trait]
impl HolderProvider for MoralisClient {
    /// Fetch holder statistics for a specific token
    async fn holders(&self, address: &str) -> Result<MoralisTokenHolders, ProviderError> {
        let url = format!("{}/token/mainnet/holders/{}", self.solana_base_url, address);
        debug!("Fetching holder stats from Moralis for {}", address);
        self.get(&url, &[]).await
    }
}

#[async_trait]
impl AnalyticsProvider for MoralisClient {
    async fn analytics(&self, address: &str) -> Result<MoralisTokenAnalytics, ProviderError> {
        let url = format!("{}/tokens/{}/analytics", self.deep_index_url, address);
        debug!("Fetching token analytics from Moralis for {}", address);
        self.get(&url, &[("chain", "solana")]).await
    }
}

#[async_trait]
impl PairStatsProvider for MoralisClient {
    async fn pair_stats(&self, address: &str) -> Result<MoralisPairStats, ProviderError> {
        let url = format!("{}/token/mainnet/{}/pairs/stats", self.solana_base_url, address);
        debug!("Fetching pair stats from Moralis for {}", address);
        self.get(&url, &[]).await
    }
}

#[async_trait]
impl BondingStatusProvider for MoralisClient {
    async fn bonding_status(&self, address: &str) -> Result<BondingStatus, ProviderError> {
        let url = format!("{}/token/mainnet/{}/bonding-status", self.solana_base_url, address);
        debug!("Fetching bonding status from Moralis for {}", address);
        self.get(&url, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "DrYycgh9zji24sT39tpWWtKw99CFQFEV8M9Tx5scpump";

    fn client(server: &mockito::Server) -> MoralisClient {
        MoralisClient::new("test-key", Some(&server.url()), Some(&server.url()), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_holders_parsing() {
        let json = r#"{
            "totalHolders": 3,
            "holdersByAcquisition": { "swap": 2, "transfer": 1, "airdrop": 0 },
            "holderChange": {
                "5min": { "change": 1, "changePercent": 50 },
                "24h": { "change": -2, "changePercent": "-40.5" }
            },
            "holderDistribution": { "whales": 1, "shrimps": 2 },
            "holderSupply": { "top10": { "supply": "1000", "supplyPercent": 85.2 } }
        }"#;

        let holders: MoralisTokenHolders = serde_json::from_str(json).unwrap();
        assert_eq!(holders.total_holders, Some(3));
        let change = holders.holder_change.unwrap();
        assert_eq!(change.m5.unwrap().change, 1);
        assert!(change.h1.is_none());
        assert!((change.h24.unwrap().change_percent + 40.5).abs() < 1e-9);
        assert_eq!(holders.holder_distribution.unwrap().sharks, 0);
        assert!((holders.holder_supply.unwrap().top10.unwrap().supply_percent - 85.2).abs() < 1e-9);
    }

    #[test]
    fn test_analytics_parsing() {
        let json = r#"{
            "tokenAddress": "abc",
            "totalBuyVolume": { "5m": 1, "1h": 2, "6h": 3, "24h": 20000 },
            "totalSellVolume": { "24h": 10000 },
            "totalBuys": { "24h": 42 },
            "totalLiquidityUsd": "10620.278514306",
            "totalFullyDilutedValuation": "25000"
        }"#;

        let analytics: MoralisTokenAnalytics = serde_json::from_str(json).unwrap();
        assert!((analytics.volume_24h() - 30000.0).abs() < 0.01);
        assert!((analytics.liquidity_usd() - 10620.278514306).abs() < 1e-6);
        assert!((analytics.fully_diluted_valuation() - 25000.0).abs() < 0.01);
        assert_eq!(analytics.total_sells.h24, 0.0);
    }

    #[test]
    fn test_bonding_status_graduated_is_complete() {
        let graduated: BondingStatus =
            serde_json::from_str(r#"{"mint":"abc","graduatedAt":"2025-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(graduated.effective_progress(), Some(100.0));

        let bonding: BondingStatus = serde_json::from_str(r#"{"bondingProgress":33.36}"#).unwrap();
        assert!((bonding.effective_progress().unwrap() - 33.36).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_pair_stats_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", format!("/token/mainnet/{}/pairs/stats", TOKEN).as_str())
            .match_header("X-API-Key", "test-key")
            .with_status(200)
            .with_body(
                r#"{
                    "totalLiquidityUsd": 8767.668217442,
                    "totalActivePairs": 2,
                    "totalActiveDexes": 1,
                    "totalSwaps": { "5min": 1, "1h": 10, "4h": 40, "24h": 120 },
                    "totalVolume": { "24h": 50000 }
                }"#,
            )
            .create_async()
            .await;

        let stats = client(&server).pair_stats(TOKEN).await.unwrap();
        assert_eq!(stats.total_active_pairs, 2);
        assert_eq!(stats.total_swaps.h24, 120.0);
        assert_eq!(stats.total_volume.h24, 50000.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_analytics_request_targets_solana_chain() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", format!("/tokens/{}/analytics", TOKEN).as_str())
            .match_query(mockito::Matcher::UrlEncoded("chain".into(), "solana".into()))
            .with_status(200)
            .with_body(r#"{"tokenAddress": "x"}"#)
            .create_async()
            .await;

        let analytics = client(&server).analytics(TOKEN).await.unwrap();
        assert_eq!(analytics.volume_24h(), 0.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bonding_status_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("/token/mainnet/{}/bonding-status", TOKEN).as_str())
            .with_status(404)
            .create_async()
            .await;

        let err = client(&server).bonding_status(TOKEN).await.unwrap_err();
        assert_eq!(err, ProviderError::NotFound);
    }
}
