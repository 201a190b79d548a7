//! API request handlers
use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use tracing::error;

use crate::api::types::HealthResponse;
use crate::api::types::StatsResponse;
use crate::api::types::UnhealthyResponse;
use crate::config::AppConfig;
use crate::database::Database;
use crate::ledger::LedgerGateway;
use crate::sync::SyncStats;
use crate::sync::WatermarkTracker;

pub mod identity;

pub use identity::*;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: Arc<Database>,
    pub ledger: Arc<LedgerGateway>,
    pub stats: Arc<SyncStats>,
    pub watermarks: Arc<WatermarkTracker>,
}

/// Health check handler: healthy only if the trust store answers `SELECT 1`
pub async fn health(State(state): State<AppState>) -> Response {
    match state.database.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                service: "trustsync".to_string(),
                uptime_seconds: state.stats.uptime_seconds(),
                last_sync: state.stats.last_sync(),
                ledger_state: state.ledger.state(),
                timestamp: Utc::now(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(UnhealthyResponse {
                    status: "unhealthy".to_string(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                }),
            )
                .into_response()
        }
    }
}

/// Best-known counters, independent of current error state
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.stats.snapshot(),
        sync_interval_seconds: state.config.sync.interval_secs,
        ledger_state: state.ledger.state(),
        ledger_calls: state.ledger.calls_attempted(),
        watermarks: state.watermarks.snapshot().await,
    })
}

/// Prometheus metrics endpoint handler
pub async fn get_metrics(State(state): State<AppState>) -> Result<Response, StatusCode> {
    match state.stats.render_metrics() {
        Ok(metrics_text) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            metrics_text,
        )
            .into_response()),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
