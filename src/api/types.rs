//! API request and response types

use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::ledger::ConnectionState;
use crate::sync::Direction;
use crate::sync::StatsSnapshot;

/// Health check response when the store answers
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub uptime_seconds: f64,
    pub last_sync: Option<DateTime<Utc>>,
    pub ledger_state: ConnectionState,
    pub timestamp: DateTime<Utc>,
}

/// Health check response when the store is unreachable
#[derive(Debug, Serialize, Deserialize)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Sync statistics response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub sync_interval_seconds: u64,
    pub ledger_state: ConnectionState,
    pub ledger_calls: u64,
    pub watermarks: HashMap<Direction, DateTime<Utc>>,
}

/// Resolved identity
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub did: String,
    pub agent_pubkey: String,
    pub display_name: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub resolved_at: DateTime<Utc>,
}

/// Successful registration
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub status: String,
    pub did: String,
    pub agent_pubkey: String,
}

/// Key rotation request
#[derive(Debug, Deserialize)]
pub struct UpdateIdentityRequest {
    pub new_agent_pubkey: String,
    #[serde(default = "default_update_reason")]
    pub reason: String,
}

fn default_update_reason() -> String {
    "key_rotation".to_string()
}

/// Successful key rotation
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateIdentityResponse {
    pub status: String,
    pub did: String,
    pub new_agent_pubkey: String,
}

/// Error body for the identity endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
