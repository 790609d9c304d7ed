// src/market/cache.rs
//
// Keeps a snapshot of reference market prices (BTC/ETH/SOL by default)
// refreshed in the background, so every answer can quote current prices
// together with how old they are.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::SymbolPriceProvider;
use crate::config::Config;
use crate::error::ProviderError;
use crate::models::MarketSymbolSnapshot;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct MarketCacheConfig {
    /// Symbols to track, upper case
    pub symbols: Vec<String>,
    /// Quote currency, e.g. "usd"
    pub currency: String,
    /// How often the background task refreshes
    pub refresh_interval: Duration,
    /// Prices older than this are flagged as stale
    pub stale_after: Duration,
}

impl Default for MarketCacheConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()],
            currency: "usd".to_string(),
            refresh_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(600),
        }
    }
}

impl From<&Config> for MarketCacheConfig {
    fn from(config: &Config) -> Self {
        Self {
            symbols: config.market_symbols.clone(),
            currency: config.market_currency.clone(),
            refresh_interval: config.market_refresh_interval(),
            stale_after: Duration::from_secs(config.market_stale_secs),
        }
    }
}

// ============================================================================
// STATE
// ============================================================================

/// One complete refresh result. Replaced wholesale, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketState {
    pub symbols: Vec<MarketSymbolSnapshot>,
    pub refreshed_at: DateTime<Utc>,
}

type SharedState = Arc<RwLock<Option<Arc<MarketState>>>>;

// ============================================================================
// MARKET CACHE
// ============================================================================

pub struct MarketCache {
    config: MarketCacheConfig,
    provider: Arc<dyn SymbolPriceProvider>,
    /// `None` until the first successful refresh
    state: SharedState,
    /// Serializes refreshes so concurrent cold reads fetch once
    refresh_lock: Arc<Mutex<()>>,
    running: Arc<RwLock<bool>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl MarketCache {
    pub fn new(provider: Arc<dyn SymbolPriceProvider>, config: MarketCacheConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            provider,
            state: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
            running: Arc::new(RwLock::new(false)),
            shutdown_tx,
        }
    }

    /// Start the periodic refresh task.
    pub async fn start(&self) -> Result<()> {
        if self.config.refresh_interval.is_zero() {
            return Err(anyhow!("Market refresh interval must be greater than zero"));
        }

        let mut running = self.running.write().await;
        if *running {
            return Err(anyhow!("Market cache is already running"));
        }
        *running = true;
        drop(running);

        info!(
            "Starting market cache for {:?}, refresh every {:?}",
            self.config.symbols, self.config.refresh_interval
        );
        self.spawn_refresh_task();
        Ok(())
    }

    fn spawn_refresh_task(&self) {
        let provider = self.provider.clone();
        let config = self.config.clone();
        let state = self.state.clone();
        let refresh_lock = self.refresh_lock.clone();
        let running = self.running.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut refresh_timer = interval(config.refresh_interval);
            refresh_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Market cache received shutdown signal");
                        break;
                    }

                    _ = refresh_timer.tick() => {
                        if !*running.read().await {
                            break;
                        }

                        let _guard = refresh_lock.lock().await;
                        if let Err(e) = Self::refresh_state(&provider, &config, &state).await {
                            warn!("Market refresh failed, keeping previous prices: {}", e);
                        }
                    }
                }
            }
        });
    }

    /// Stop the periodic refresh task.
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping market cache...");
        *self.running.write().await = false;
        let _ = self.shutdown_tx.send(());
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Fetch now and replace the state. On failure the previous state stays.
    pub async fn refresh(&self) -> Result<(), ProviderError> {
        let _guard = self.refresh_lock.lock().await;
        Self::refresh_state(&self.provider, &self.config, &self.state).await
    }

    async fn refresh_state(
        provider: &Arc<dyn SymbolPriceProvider>,
        config: &MarketCacheConfig,
        state: &SharedState,
    ) -> Result<(), ProviderError> {
        debug!("Refreshing market prices for {:?}", config.symbols);
        let prices = provider.symbol_prices(&config.symbols).await?;
        let fetched_at = Utc::now();

        let fresh: Vec<MarketSymbolSnapshot> = prices
            .iter()
            .filter_map(|entry| {
                entry.price_in(&config.currency).map(|quote| MarketSymbolSnapshot {
                    symbol: entry.symbol.to_uppercase(),
                    price: quote.value,
                    currency: quote.currency.to_uppercase(),
                    last_updated_at: quote.last_updated_at,
                    fetched_at,
                })
            })
            .collect();

        if fresh.is_empty() {
            return Err(ProviderError::Malformed(format!(
                "no {} prices returned for {:?}",
                config.currency, config.symbols
            )));
        }

        let mut current = state.write().await;
        let previous = current.clone();

        // Symbols missing from this round keep their last known price and age
        let symbols = config
            .symbols
            .iter()
            .filter_map(|symbol| {
                fresh
                    .iter()
                    .find(|s| s.symbol == *symbol)
                    .cloned()
                    .or_else(|| {
                        previous
                            .as_ref()
                            .and_then(|p| p.symbols.iter().find(|s| s.symbol == *symbol).cloned())
                    })
            })
            .collect();

        *current = Some(Arc::new(MarketState {
            symbols,
            refreshed_at: fetched_at,
        }));
        Ok(())
    }

    /// Current state, refreshing once first if nothing was ever fetched.
    pub async fn snapshot(&self) -> Option<Arc<MarketState>> {
        if let Some(state) = self.state.read().await.clone() {
            return Some(state);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another reader may have warmed the cache while we waited
        if let Some(state) = self.state.read().await.clone() {
            return Some(state);
        }

        info!("Market cache is empty, refreshing before first read");
        if let Err(e) = Self::refresh_state(&self.provider, &self.config, &self.state).await {
            warn!("Initial market refresh failed: {}", e);
        }
        self.state.read().await.clone()
    }

    pub async fn market_status_text(&self) -> String {
        match self.snapshot().await {
            Some(state) => render_market_status(&state.symbols, Utc::now(), self.config.stale_after),
            None => "Market prices are currently unavailable.".to_string(),
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn format_age(age: chrono::Duration) -> String {
    let seconds = age.num_seconds();
    let (value, unit) = if seconds < 60 {
        (seconds, "second")
    } else if seconds < 3_600 {
        (age.num_minutes(), "minute")
    } else if seconds < 86_400 {
        (age.num_hours(), "hour")
    } else {
        (age.num_days(), "day")
    };
    let plural = if value == 1 { "" } else { "s" };
    format!("updated {} {}{} ago", value, unit, plural)
}

fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{:.2}", price)
    } else {
        format!("{:.6}", price)
    }
}

/// Renders one line per symbol, always with the price age. Prices older
/// than `stale_after` are marked STALE.
pub fn render_market_status(
    symbols: &[MarketSymbolSnapshot],
    now: DateTime<Utc>,
    stale_after: Duration,
) -> String {
    if symbols.is_empty() {
        return "Market prices are currently unavailable.".to_string();
    }

    symbols
        .iter()
        .map(|s| {
            let age = s.age(now);
            let mut line = format!(
                "- {}: {} {} ({})",
                s.symbol,
                format_price(s.price),
                s.currency,
                format_age(age)
            );
            if age.to_std().unwrap_or_default() > stale_after {
                line.push_str(" STALE");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::alchemy::{QuotedPrice, SymbolPrice};
    use async_trait::async_trait;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct MockPrices {
        calls: AtomicUsize,
        failing: AtomicBool,
        delay: Duration,
    }

    impl MockPrices {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                delay: Duration::from_millis(0),
            })
        }
    }

    #[async_trait]
    impl SymbolPriceProvider for MockPrices {
        async fn symbol_prices(&self, symbols: &[String]) -> Result<Vec<SymbolPrice>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProviderError::Unavailable("503".to_string()));
            }
            Ok(symbols
                .iter()
                .map(|symbol| SymbolPrice {
                    symbol: symbol.clone(),
                    prices: vec![QuotedPrice {
                        currency: "usd".to_string(),
                        value: 100.0 + call as f64,
                        last_updated_at: Utc::now(),
                    }],
                    error: None,
                })
                .collect())
        }
    }

    fn snapshot_at(symbol: &str, price: f64, last_updated_at: DateTime<Utc>) -> MarketSymbolSnapshot {
        MarketSymbolSnapshot {
            symbol: symbol.to_string(),
            price,
            currency: "USD".to_string(),
            last_updated_at,
            fetched_at: last_updated_at,
        }
    }

    #[tokio::test]
    async fn test_empty_read_refreshes_exactly_once() {
        let provider = MockPrices::new();
        let cache = MarketCache::new(provider.clone(), MarketCacheConfig::default());

        let first = cache.snapshot().await.unwrap();
        assert_eq!(first.symbols.len(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let second = cache.snapshot().await.unwrap();
        cache.market_status_text().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_cold_reads_fetch_once() {
        let provider = Arc::new(MockPrices {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: Duration::from_millis(30),
        });
        let cache = MarketCache::new(provider.clone(), MarketCacheConfig::default());

        let reads = join_all((0..8).map(|_| cache.snapshot())).await;
        assert!(reads.iter().all(|r| r.is_some()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_state() {
        let provider = MockPrices::new();
        let cache = MarketCache::new(provider.clone(), MarketCacheConfig::default());
        tokio_test::assert_ok!(cache.refresh().await);
        let before = cache.snapshot().await.unwrap();

        provider.failing.store(true, Ordering::SeqCst);
        tokio_test::assert_err!(cache.refresh().await);

        let after = cache.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_unavailable_when_never_fetched() {
        let provider = MockPrices::new();
        provider.failing.store(true, Ordering::SeqCst);
        let cache = MarketCache::new(provider.clone(), MarketCacheConfig::default());

        assert_eq!(
            cache.market_status_text().await,
            "Market prices are currently unavailable."
        );
    }

    #[tokio::test]
    async fn test_background_refresh_runs_until_stopped() {
        let provider = MockPrices::new();
        let config = MarketCacheConfig {
            refresh_interval: Duration::from_millis(20),
            ..MarketCacheConfig::default()
        };
        let cache = MarketCache::new(provider.clone(), config);

        tokio_test::assert_ok!(cache.start().await);
        assert!(cache.start().await.is_err());
        tokio::time::sleep(Duration::from_millis(90)).await;
        cache.stop().await.unwrap();
        assert!(!cache.is_running().await);

        let calls = provider.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "expected periodic refreshes, got {}", calls);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_zero_refresh_interval_is_rejected() {
        let config = MarketCacheConfig {
            refresh_interval: Duration::ZERO,
            ..MarketCacheConfig::default()
        };
        let cache = MarketCache::new(MockPrices::new(), config);

        tokio_test::assert_err!(cache.start().await);
        assert!(!cache.is_running().await);
    }

    #[test]
    fn test_render_always_shows_age_and_flags_stale() {
        let now = Utc::now();
        let symbols = vec![
            snapshot_at("BTC", 64250.123, now - chrono::Duration::minutes(3)),
            snapshot_at("SOL", 0.5, now - chrono::Duration::minutes(15)),
            snapshot_at("ETH", 2650.0, now - chrono::Duration::seconds(1)),
        ];

        let text = render_market_status(&symbols, now, Duration::from_secs(600));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "- BTC: 64250.12 USD (updated 3 minutes ago)");
        assert_eq!(lines[1], "- SOL: 0.500000 USD (updated 15 minutes ago) STALE");
        assert_eq!(lines[2], "- ETH: 2650.00 USD (updated 1 second ago)");
    }
}
