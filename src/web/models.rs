//! Request and Response DTOs for the Web API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SUPPORTED_NETWORK;

// ============================================================================
// Health & Status
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MarketStatusResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Token Analysis
// ============================================================================

fn default_network() -> String {
    DEFAULT_SUPPORTED_NETWORK.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub address: String,
    #[serde(default = "default_network")]
    pub network: String,
    pub conversation_id: String,
    /// Re-aggregate even when this conversation already analyzed the token
    #[serde(default)]
    pub refresh: bool,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}
