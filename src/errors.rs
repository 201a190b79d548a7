use thiserror::Error;

use crate::sync::types::Direction;

#[derive(Error, Debug)]
pub enum TrustSyncError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Duplicate item rejected by store: {0}")]
    DuplicateItem(String),

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Ledger rejected {function}: {detail}")]
    LedgerRejected { function: String, detail: String },

    #[error("Item rejected: {0}")]
    ItemRejected(String),

    #[error("{direction} cycle failed: {reason}")]
    CycleFailed { direction: Direction, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl TrustSyncError {
    /// Whether the failure is transient and worth retrying on a later cycle.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::LedgerUnavailable(_) | Self::WebSocket(_)
        )
    }

    pub(crate) fn cycle_failed(direction: Direction, source: &Self) -> Self {
        Self::CycleFailed {
            direction,
            reason: source.to_string(),
        }
    }
}

impl From<&str> for TrustSyncError {
    fn from(msg: &str) -> Self {
        Self::Custom(msg.to_string())
    }
}

impl From<String> for TrustSyncError {
    fn from(msg: String) -> Self {
        Self::Custom(msg)
    }
}

pub type Result<T> = std::result::Result<T, TrustSyncError>;
