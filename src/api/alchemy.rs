use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{de, http_client, read_json, SymbolPriceProvider};
use crate::error::ProviderError;

const ALCHEMY_BASE_URL: &str = "https://api.g.alchemy.com";

#[derive(Debug, Clone)]
pub struct AlchemyClient {
    api_key: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct PricesBySymbolResponse {
    #[serde(default)]
    data: Vec<SymbolPrice>,
}

/// Prices of one symbol, one entry per quote currency.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolPrice {
    pub symbol: String,
    #[serde(default)]
    pub prices: Vec<QuotedPrice>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotedPrice {
    pub currency: String,
    #[serde(deserialize_with = "de::f64_lenient")]
    pub value: f64,
    pub last_updated_at: DateTime<Utc>,
}

impl SymbolPrice {
    /// Quote in the given currency, case-insensitive.
    pub fn price_in(&self, currency: &str) -> Option<&QuotedPrice> {
        self.prices
            .iter()
            .find(|p| p.currency.eq_ignore_ascii_case(currency))
    }
}

impl AlchemyClient {
    pub fn new(api_key: &str, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or(ALCHEMY_BASE_URL).trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl SymbolPriceProvider for AlchemyClient {
    async fn symbol_prices(&self, symbols: &[String]) -> Result<Vec<SymbolPrice>, ProviderError> {
        let url = format!("{}/prices/v1/{}/tokens/by-symbol", self.base_url, self.api_key);
        debug!("Fetching prices from Alchemy for {:?}", symbols);

        let query: Vec<(&str, &str)> = symbols.iter().map(|s| ("symbols", s.as_str())).collect();
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await?;

        let response_data: PricesBySymbolResponse = read_json(response, "Alchemy").await?;

        for entry in response_data.data.iter().filter(|e| e.error.is_some()) {
            warn!(
                "Alchemy returned no price for {}: {}",
                entry.symbol,
                entry.error.as_deref().unwrap_or_default()
            );
        }

        Ok(response_data.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_symbol_prices_sends_repeated_symbols() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/prices/v1/test-key/tokens/by-symbol")
            .match_query(Matcher::Exact("symbols=BTC&symbols=SOL".into()))
            .with_status(200)
            .with_body(
                r#"{"data": [
                    {"symbol": "BTC", "prices": [{"currency": "usd", "value": "64250.12", "lastUpdatedAt": "2025-02-11T09:15:00Z"}]},
                    {"symbol": "SOL", "prices": [], "error": "Token not found"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = AlchemyClient::new("test-key", Some(&server.url()), Duration::from_secs(5)).unwrap();
        let prices = client
            .symbol_prices(&["BTC".to_string(), "SOL".to_string()])
            .await
            .unwrap();

        assert_eq!(prices.len(), 2);
        let btc = prices[0].price_in("USD").unwrap();
        assert!((btc.value - 64250.12).abs() < 1e-9);
        assert!(prices[1].price_in("usd").is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_symbol_prices_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/prices/v1/k/tokens/by-symbol")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let client = AlchemyClient::new("k", Some(&server.url()), Duration::from_secs(5)).unwrap();
        let err = client.symbol_prices(&["ETH".to_string()]).await.unwrap_err();
        assert_eq!(err, ProviderError::RateLimited);
    }
}
