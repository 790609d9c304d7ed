use anyhow::{Context, Result};
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use token_forge::analysis::{
    Aggregator, AggregatorConfig, AnalysisCache, AnalysisService, ProviderSet, Scorer, ServiceConfig,
};
use token_forge::api::alchemy::AlchemyClient;
use token_forge::api::completion::CompletionClient;
use token_forge::api::moralis::MoralisClient;
use token_forge::api::solanafm::SolanaFmClient;
use token_forge::api::solscan::SolscanClient;
use token_forge::config::Config;
use token_forge::market::{MarketCache, MarketCacheConfig};
use token_forge::models::NewsArticle;
use token_forge::storage::{ConversationStore, SledConversationStore};
use token_forge::web::{server::start_server, AppState};

fn load_news(path: Option<&Path>) -> Vec<NewsArticle> {
    let Some(path) = path else {
        return Vec::new();
    };

    let articles = std::fs::read_to_string(path)
        .context("Failed to read news articles")
        .and_then(|raw| serde_json::from_str::<Vec<NewsArticle>>(&raw).context("Invalid news JSON"));
    match articles {
        Ok(articles) => {
            info!("Loaded {} news articles from {}", articles.len(), path.display());
            articles
        }
        Err(e) => {
            warn!("Ignoring news articles at {}: {:#}", path.display(), e);
            Vec::new()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration and wrap in Arc
    let config = Arc::new(Config::load()?);
    info!("Configuration loaded successfully");

    let timeout = config.provider_timeout();
    let moralis = Arc::new(MoralisClient::new(
        &config.moralis_api_key,
        config.moralis_base_url.as_deref(),
        config.moralis_deep_index_url.as_deref(),
        timeout,
    )?);
    let providers = ProviderSet {
        primary_metadata: Arc::new(SolscanClient::new(
            &config.solscan_api_key,
            config.solscan_base_url.as_deref(),
            timeout,
        )?),
        secondary_metadata: Arc::new(SolanaFmClient::new(config.solanafm_base_url.as_deref(), timeout)?),
        holders: moralis.clone(),
        analytics: moralis.clone(),
        pair_stats: moralis.clone(),
        bonding_status: moralis,
    };
    let aggregator = Arc::new(Aggregator::new(
        providers,
        AggregatorConfig {
            call_timeout: timeout,
            bonding_timeout: config.bonding_timeout(),
        },
    ));
    info!("Provider clients initialized");

    let store: Arc<dyn ConversationStore> = Arc::new(
        SledConversationStore::open(config.data_dir.join("conversations"))
            .context("Failed to open conversation store")?,
    );

    let market = Arc::new(MarketCache::new(
        Arc::new(AlchemyClient::new(
            &config.alchemy_api_key,
            config.alchemy_base_url.as_deref(),
            timeout,
        )?),
        MarketCacheConfig::from(config.as_ref()),
    ));
    market.start().await?;

    let cache = Arc::new(AnalysisCache::new(
        aggregator,
        Scorer::default(),
        store.clone(),
        load_news(config.news_articles_path.as_deref()),
    ));
    let replies = Arc::new(CompletionClient::new(
        &config.llm_api_key,
        &config.llm_base_url,
        &config.llm_model,
        // Generation is slower than data lookups
        timeout * 6,
    )?);
    let service = Arc::new(AnalysisService::new(
        cache,
        market.clone(),
        store,
        replies,
        ServiceConfig::from(config.as_ref()),
    ));

    info!("Starting TokenForge...");
    let result = start_server(AppState::new(service), config.clone()).await;

    market.stop().await?;
    result
}
