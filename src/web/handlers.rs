//! Request handlers for all API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::{error, info, warn};

use super::models::*;
use super::AppState;
use crate::analysis::AnalysisReply;
use crate::error::{AnalysisError, FailureKind};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn analysis_error(e: &AnalysisError) -> ApiError {
    let status = match (e, e.kind()) {
        (AnalysisError::InvalidAddress(_), _) => StatusCode::BAD_REQUEST,
        (_, FailureKind::InvalidRequest) => StatusCode::BAD_REQUEST,
        (_, FailureKind::UnsupportedNetwork) => StatusCode::BAD_REQUEST,
        (_, FailureKind::InvalidToken) => StatusCode::NOT_FOUND,
        (_, FailureKind::TemporarilyUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status,
        Json(ErrorResponse {
            error: e.user_message(),
            details: Some(e.to_string()),
        }),
    )
}

// ============================================================================
// Health Check
// ============================================================================

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

// ============================================================================
// Market Status
// ============================================================================

pub async fn market_status(State(state): State<AppState>) -> Json<MarketStatusResponse> {
    Json(MarketStatusResponse {
        status: state.service.market_status_text().await,
        timestamp: Utc::now(),
    })
}

// ============================================================================
// Token Analysis
// ============================================================================

pub async fn analyze_token(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisReply>, ApiError> {
    let result = if req.refresh {
        state
            .service
            .reanalyze_token(&req.address, &req.network, &req.conversation_id)
            .await
    } else {
        state
            .service
            .request_token_analysis(&req.address, &req.network, &req.conversation_id)
            .await
    };

    match result {
        Ok(reply) => Ok(Json(reply)),
        Err(e) => {
            match e.kind() {
                FailureKind::TemporarilyUnavailable => {
                    error!("Failed to analyze token {}: {}", req.address, e)
                }
                _ => warn!("Rejected analysis of {}: {}", req.address, e),
            }
            Err(analysis_error(&e))
        }
    }
}

// ============================================================================
// Conversations
// ============================================================================

pub async fn delete_conversation_analyses(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.service.delete_conversation(&conversation_id).await {
        Ok(()) => {
            info!("Deleted analyses for conversation {}", conversation_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) if e.kind() == FailureKind::InvalidRequest => Err(analysis_error(&e)),
        Err(e) => {
            error!("Failed to delete conversation {}: {}", conversation_id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to delete conversation".to_string(),
                    details: Some(e.to_string()),
                }),
            ))
        }
    }
}
