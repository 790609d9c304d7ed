pub mod assessment;
pub mod market;
pub mod message;
pub mod token;

// Re-export commonly used types
pub use assessment::{
    CategoryBreakdown, CategoryScore, NarrativeSection, NewsArticle, RiskAssessment, RiskFlag,
    RiskFlagKind, SubPoint,
};
pub use market::MarketSymbolSnapshot;
pub use message::{ChatMessage, ChatRole};
pub use token::{
    ActivityMetrics, DataGap, DexInfo, HolderAcquisition, HolderChange, HolderChanges,
    HolderDistribution, HolderMetrics, MarketData, OnChainMetrics, SecurityInfo, SocialLinks,
    TokenMetadata, TokenSnapshot, VolumeSources,
};
