//! Web API module for TokenForge
//!
//! Thin REST surface over the analysis service and the market cache.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;

use std::sync::Arc;

use crate::analysis::AnalysisService;

/// Shared application state for all API handlers
#[derive(Clone)]
pub struct AppState {
    /// Token analysis entry point
    pub service: Arc<AnalysisService>,
}

impl AppState {
    pub fn new(service: Arc<AnalysisService>) -> Self {
        Self { service }
    }
}
