use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SUPPORTED_NETWORK: &str = "solana-mainnet";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub solscan_api_key: String,
    pub moralis_api_key: String,
    pub alchemy_api_key: String,

    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,

    // Base URL overrides, mostly useful against mock servers
    pub solscan_base_url: Option<String>,
    pub solanafm_base_url: Option<String>,
    pub moralis_base_url: Option<String>,
    pub moralis_deep_index_url: Option<String>,
    pub alchemy_base_url: Option<String>,

    pub provider_timeout_secs: u64,
    pub bonding_timeout_secs: u64,

    pub market_refresh_secs: u64,
    pub market_stale_secs: u64,
    pub market_symbols: Vec<String>,
    pub market_currency: String,

    pub supported_network: String,
    pub history_limit: usize,
    pub data_dir: PathBuf,
    pub news_articles_path: Option<PathBuf>,

    pub api_host: Option<String>,
    pub api_port: Option<u16>,
}

/// Parses a whole number of seconds that must be at least 1.
fn non_zero_secs(name: &str, raw: &str) -> Result<u64> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", name))?;
    if secs == 0 {
        anyhow::bail!("{} must be at least 1", name);
    }
    Ok(secs)
}

impl Config {
    pub fn load() -> Result<Self> {
        let market_symbols = env::var("MARKET_SYMBOLS")
            .unwrap_or_else(|_| "BTC,ETH,SOL".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        Ok(Self {
            solscan_api_key: env::var("SOLSCAN_API_KEY")
                .context("SOLSCAN_API_KEY not set in environment")?,
            moralis_api_key: env::var("MORALIS_API_KEY")
                .context("MORALIS_API_KEY not set in environment")?,
            alchemy_api_key: env::var("ALCHEMY_API_KEY")
                .context("ALCHEMY_API_KEY not set in environment")?,

            llm_api_key: env::var("LLM_API_KEY")
                .context("LLM_API_KEY not set in environment")?,
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.deepseek.com".to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string()),

            solscan_base_url: env::var("SOLSCAN_BASE_URL").ok(),
            solanafm_base_url: env::var("SOLANAFM_BASE_URL").ok(),
            moralis_base_url: env::var("MORALIS_BASE_URL").ok(),
            moralis_deep_index_url: env::var("MORALIS_DEEP_INDEX_URL").ok(),
            alchemy_base_url: env::var("ALCHEMY_BASE_URL").ok(),

            provider_timeout_secs: env::var("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Failed to parse PROVIDER_TIMEOUT_SECS")?,
            bonding_timeout_secs: env::var("BONDING_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Failed to parse BONDING_TIMEOUT_SECS")?,

            market_refresh_secs: non_zero_secs(
                "MARKET_REFRESH_SECS",
                &env::var("MARKET_REFRESH_SECS").unwrap_or_else(|_| "60".to_string()),
            )?,
            market_stale_secs: env::var("MARKET_STALE_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .context("Failed to parse MARKET_STALE_SECS")?,
            market_symbols,
            market_currency: env::var("MARKET_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|_| "usd".to_string()),

            supported_network: env::var("SUPPORTED_NETWORK")
                .unwrap_or_else(|_| DEFAULT_SUPPORTED_NETWORK.to_string()),
            history_limit: env::var("HISTORY_LIMIT")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            news_articles_path: env::var("NEWS_ARTICLES_PATH").ok().map(PathBuf::from),

            api_host: env::var("API_HOST").ok(),
            api_port: env::var("API_PORT").ok().and_then(|p| p.parse().ok()),
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn bonding_timeout(&self) -> Duration {
        Duration::from_secs(self.bonding_timeout_secs)
    }

    pub fn market_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.market_refresh_secs)
    }
}
