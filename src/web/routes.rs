//! API route definitions

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers;
use super::AppState;

/// Create all API routes
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(handlers::health_check))

        // Market prices
        .route("/api/market-status", get(handlers::market_status))

        // Token analysis
        .route("/api/token-analysis", post(handlers::analyze_token))

        // Conversations
        .route("/api/conversations/:id/analyses", delete(handlers::delete_conversation_analyses))

        // Add state to all routes
        .with_state(state)
}
