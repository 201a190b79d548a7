//! Identity registry handlers (DID ↔ agent key)

use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use tracing::error;
use tracing::info;

use super::AppState;
use crate::api::types::ErrorResponse;
use crate::api::types::RegisterResponse;
use crate::api::types::ResolveResponse;
use crate::api::types::UpdateIdentityRequest;
use crate::api::types::UpdateIdentityResponse;
use crate::models::parse_did;
use crate::models::validate_agent_pubkey;
use crate::models::NewIdentity;
use crate::TrustSyncError;

const REQUEST_SOURCE_HEADER: &str = "x-request-source";

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

fn store_failure(e: &TrustSyncError) -> Response {
    error!("Identity registry error: {}", e);
    let status = if e.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_response(status, e.to_string())
}

/// Resolve a DID (GET /resolve/:did)
pub async fn resolve_identity(
    State(state): State<AppState>,
    Path(did): Path<String>,
    headers: HeaderMap,
) -> Response {
    let source = headers
        .get(REQUEST_SOURCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    match state.database.resolve_identity(&did, source).await {
        Ok(Some(record)) => (
            StatusCode::OK,
            Json(ResolveResponse {
                did: record.did,
                agent_pubkey: record.agent_pubkey,
                display_name: record.display_name,
                last_seen: record.last_seen,
                resolved_at: Utc::now(),
            }),
        )
            .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("DID not found: {did}")),
        Err(e) => store_failure(&e),
    }
}

/// Register a new DID mapping (POST /register)
pub async fn register_identity(
    State(state): State<AppState>,
    Json(request): Json<NewIdentity>,
) -> Response {
    if let Err(e) = parse_did(&request.did).and_then(|_| validate_agent_pubkey(&request.agent_pubkey)) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    match state.database.register_identity(&request).await {
        Ok(true) => {
            info!("Registered {} via API", request.did);
            (
                StatusCode::CREATED,
                Json(RegisterResponse {
                    status: "registered".to_string(),
                    did: request.did,
                    agent_pubkey: request.agent_pubkey,
                }),
            )
                .into_response()
        }
        Ok(false) => error_response(
            StatusCode::CONFLICT,
            format!("DID already registered: {}", request.did),
        ),
        Err(e) => store_failure(&e),
    }
}

/// Point a DID at a new agent key (PUT /update/:did)
pub async fn update_identity(
    State(state): State<AppState>,
    Path(did): Path<String>,
    Json(request): Json<UpdateIdentityRequest>,
) -> Response {
    if let Err(e) = validate_agent_pubkey(&request.new_agent_pubkey) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    match state
        .database
        .update_identity_key(&did, &request.new_agent_pubkey, &request.reason)
        .await
    {
        Ok(true) => (
            StatusCode::OK,
            Json(UpdateIdentityResponse {
                status: "updated".to_string(),
                did,
                new_agent_pubkey: request.new_agent_pubkey,
            }),
        )
            .into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("DID not found: {did}")),
        Err(e) => store_failure(&e),
    }
}
