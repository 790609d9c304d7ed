use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{de, http_client, read_json, PrimaryMetadataProvider};
use crate::error::ProviderError;

const SOLSCAN_BASE_URL: &str = "https://pro-api.solscan.io";

#[derive(Debug, Clone)]
pub struct SolscanClient {
    api_key: String,
    base_url: String,
    client: Client,
}

// --- Response Structs ---

// Structure for the /v2.0/token/meta endpoint response
#[derive(Debug, Deserialize)]
struct TokenMetaResponse {
    success: bool,
    data: Option<SolscanTokenInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SolscanTokenInfo {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default, deserialize_with = "de::opt_string_lenient")]
    pub supply: Option<String>,      // Raw units, sometimes sent as a number

    // Market Data
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub price_change_24h: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub volume_24h: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_f64_lenient")]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,

    // Authorities
    #[serde(default, deserialize_with = "mint_authority")]
    pub mint_authority: MintAuthority,
    #[serde(default)]
    pub freeze_authority: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,

    #[serde(default)]
    pub metadata: Option<SolscanExtraMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SolscanExtraMetadata {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

/// Solscan reports a revoked mint authority as an explicit `null`. A missing
/// field says nothing either way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum MintAuthority {
    #[default]
    Unreported,
    Revoked,
    Active(String),
}

impl MintAuthority {
    pub fn is_revoked(&self) -> bool {
        matches!(self, MintAuthority::Revoked)
    }

    pub fn active(&self) -> Option<&str> {
        match self {
            MintAuthority::Active(authority) => Some(authority),
            _ => None,
        }
    }
}

// Only called when the field is present, so `None` here is an explicit null
fn mint_authority<'de, D: Deserializer<'de>>(d: D) -> Result<MintAuthority, D::Error> {
    Ok(match Option::<String>::deserialize(d)? {
        Some(authority) => MintAuthority::Active(authority),
        None => MintAuthority::Revoked,
    })
}

// --- Solscan Client Implementation ---

impl SolscanClient {
    pub fn new(api_key: &str, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or(SOLSCAN_BASE_URL).trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl PrimaryMetadataProvider for SolscanClient {
    /// Fetches token metadata and market overview from /v2.0/token/meta.
    async fn token_info(&self, address: &str) -> Result<Option<SolscanTokenInfo>, ProviderError> {
        let url = format!("{}/v2.0/token/meta", self.base_url);
        debug!("Fetching token meta from Solscan for {}", address);

        let response = self
            .client
            .get(&url)
            .header("token", &self.api_key)
            .query(&[("address", address)])
            .send()
            .await?;

        let response_data: TokenMetaResponse = match read_json(response, "Solscan").await {
            Ok(data) => data,
            Err(ProviderError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        if !response_data.success || response_data.data.is_none() {
            warn!("Solscan reported failure or no data for token {}", address);
            return Ok(None);
        }

        Ok(response_data.data)
    }
}
