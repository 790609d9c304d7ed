pub mod cache;

pub use cache::{render_market_status, MarketCache, MarketCacheConfig, MarketState};
