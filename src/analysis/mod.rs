//! Token analysis pipeline: aggregate provider data, score it, cache the
//! result per conversation and answer analysis requests.

pub mod aggregator;
pub mod cache;
pub mod narrative;
pub mod scorer;
pub mod service;

pub use aggregator::{Aggregator, AggregatorConfig, MetadataSources, ProviderSet, Sourced};
pub use cache::{AnalysisCache, AnalysisEntry};
pub use scorer::{RiskRules, Scorer};
pub use service::{AnalysisReply, AnalysisService, ServiceConfig};
