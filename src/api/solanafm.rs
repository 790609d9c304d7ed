use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{de, http_client, read_json, SecondaryMetadataProvider};
use crate::error::ProviderError;

const SOLANAFM_BASE_URL: &str = "https://api.solana.fm";

#[derive(Debug, Clone)]
pub struct SolanaFmClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    result: Option<TokenResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResult {
    token_hash: String,
    data: Option<SolanaFmTokenData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolanaFmTokenData {
    #[serde(default)]
    token_name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    decimals: Option<u8>,
    #[serde(default, deserialize_with = "de::bool_lenient")]
    verified: bool,     // "true" as a string on most tokens
}

/// Token metadata as reported by Solana.fm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolanaFmTokenInfo {
    pub address: String,
    pub token_name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub verified: bool,
}

impl SolanaFmClient {
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.unwrap_or(SOLANAFM_BASE_URL).trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl SecondaryMetadataProvider for SolanaFmClient {
    async fn token_info(&self, address: &str) -> Result<Option<SolanaFmTokenInfo>, ProviderError> {
        let url = format!("{}/v0/tokens/{}", self.base_url, address);
        debug!("Fetching token info from Solana.fm for {}", address);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let response_data: TokenResponse = match read_json(response, "Solana.fm").await {
            Ok(data) => data,
            Err(ProviderError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(response_data.result.and_then(|result| {
            result.data.map(|data| SolanaFmTokenInfo {
                address: result.token_hash,
                token_name: data.token_name,
                symbol: data.symbol,
                decimals: data.decimals,
                verified: data.verified,
            })
        }))
    }
}
