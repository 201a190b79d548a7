//! Configuration management for `trustsync`
//!
//! Configuration is read from a TOML file and then overridden by environment
//! variables, so container deployments can run without a file at all.

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::sync::types::Direction;
use crate::sync::types::WatermarkPolicy;
use crate::Result;
use crate::TrustSyncError;

/// Upper bound for the first-run look-back windows (ten years)
const MAX_LOOKBACK_SECS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection before reporting the store unavailable
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_connection_timeout() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// WebSocket endpoint of the ledger conductor
    #[serde(default = "default_ledger_url")]
    pub url: String,
    /// Installed application identifier, first half of the cell id
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// Role/module name, second half of the cell id
    #[serde(default = "default_role_name")]
    pub role_name: String,
    /// Module holding the trust functions
    #[serde(default = "default_zome")]
    pub zome: String,
    /// Optional per-call timeout; unset means the transport default
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,
}

fn default_ledger_url() -> String {
    "ws://localhost:8888".to_string()
}

fn default_app_id() -> String {
    "trust-ledger".to_string()
}

fn default_role_name() -> String {
    "trust_ledger".to_string()
}

fn default_zome() -> String {
    "trust_filter".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: default_ledger_url(),
            app_id: default_app_id(),
            role_name: default_role_name(),
            zome: default_zome(),
            call_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between successful cycles, per direction
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Seconds to wait after a failed cycle
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
    /// Maximum trust scores fetched per publish cycle
    #[serde(default = "default_score_batch_limit")]
    pub score_batch_limit: i64,
    /// First-run look-back for the publish direction
    #[serde(default = "default_publish_lookback_secs")]
    pub publish_lookback_secs: u64,
    /// First-run look-back for the harvest direction
    #[serde(default = "default_harvest_lookback_secs")]
    pub harvest_lookback_secs: u64,
    #[serde(default)]
    pub watermark_policy: WatermarkPolicy,
    #[serde(default = "default_enabled")]
    pub enable_publish: bool,
    #[serde(default = "default_enabled")]
    pub enable_harvest: bool,
}

const fn default_interval_secs() -> u64 {
    300 // 5 minutes
}

const fn default_error_backoff_secs() -> u64 {
    60
}

const fn default_score_batch_limit() -> i64 {
    10_000
}

const fn default_publish_lookback_secs() -> u64 {
    24 * 3600
}

const fn default_harvest_lookback_secs() -> u64 {
    3600
}

const fn default_enabled() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            score_batch_limit: default_score_batch_limit(),
            publish_lookback_secs: default_publish_lookback_secs(),
            harvest_lookback_secs: default_harvest_lookback_secs(),
            watermark_policy: WatermarkPolicy::default(),
            enable_publish: true,
            enable_harvest: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8400
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub directory: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// - File I/O errors (file not found, permission denied)
    /// - TOML parsing errors (invalid syntax, type mismatches)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from an explicit path or the default locations,
    /// apply environment overrides, and validate the result.
    ///
    /// # Errors
    /// - An explicit path that cannot be read or parsed
    /// - Missing required values (database URL) after overrides
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if Path::new("config.toml").exists() {
            Self::from_file("config.toml")?
        } else if Path::new("config.example.toml").exists() {
            tracing::warn!(
                "Using config.example.toml. Please create config.toml for production use."
            );
            Self::from_file("config.example.toml")?
        } else {
            tracing::debug!("No config file found, using defaults and environment");
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from environment-style lookups.
    ///
    /// The lookup is injected so tests do not have to mutate process state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(url) = lookup("LEDGER_URL") {
            self.ledger.url = url;
        }
        if let Some(app_id) = lookup("LEDGER_APP_ID") {
            self.ledger.app_id = app_id;
        }
        if let Some(interval) = lookup("SYNC_INTERVAL") {
            self.sync.interval_secs = interval.trim().parse().map_err(|_| {
                TrustSyncError::Config(format!("SYNC_INTERVAL is not a number: {interval}"))
            })?;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| TrustSyncError::Config(format!("PORT is not a valid port: {port}")))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        Ok(())
    }

    /// Check required values. A failure here aborts startup.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(TrustSyncError::Config(
                "database url is required (set [database].url or DATABASE_URL)".to_string(),
            ));
        }
        if !(self.ledger.url.starts_with("ws://") || self.ledger.url.starts_with("wss://")) {
            return Err(TrustSyncError::Config(format!(
                "ledger url must be a ws:// or wss:// endpoint, got {}",
                self.ledger.url
            )));
        }
        if self.sync.interval_secs == 0 || self.sync.error_backoff_secs == 0 {
            return Err(TrustSyncError::Config(
                "sync intervals must be greater than zero".to_string(),
            ));
        }
        if self.sync.publish_lookback_secs > MAX_LOOKBACK_SECS
            || self.sync.harvest_lookback_secs > MAX_LOOKBACK_SECS
        {
            return Err(TrustSyncError::Config(format!(
                "look-back windows must not exceed {MAX_LOOKBACK_SECS} seconds"
            )));
        }
        if self.sync.score_batch_limit <= 0 {
            return Err(TrustSyncError::Config(
                "score_batch_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Get database URL
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Get sync interval as a duration
    #[must_use]
    pub const fn sync_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync.interval_secs)
    }

    /// Get error backoff as a duration
    #[must_use]
    pub const fn error_backoff(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sync.error_backoff_secs)
    }

    /// First-run look-back for the given direction
    #[must_use]
    pub fn lookback(&self, direction: Direction) -> chrono::Duration {
        let secs = match direction {
            Direction::Publish => self.sync.publish_lookback_secs,
            Direction::Harvest => self.sync.harvest_lookback_secs,
        };
        chrono::Duration::seconds(i64::try_from(secs.min(MAX_LOOKBACK_SECS)).unwrap_or(0))
    }

    /// Get ledger per-call timeout, if configured
    #[must_use]
    pub fn ledger_call_timeout(&self) -> Option<std::time::Duration> {
        self.ledger
            .call_timeout_secs
            .map(std::time::Duration::from_secs)
    }

    /// Configuration rendered as TOML with the database password masked
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        shown.database.url = mask_password(&self.database.url);
        toml::to_string_pretty(&shown).map_err(|e| TrustSyncError::Config(e.to_string()))
    }
}

/// Mask the password part of a connection URL
#[must_use]
pub fn mask_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.rfind('@') else {
        return url.to_string();
    };
    let credentials = &rest[..at];
    match credentials.find(':') {
        Some(colon) => format!(
            "{}://{}:****@{}",
            &url[..scheme_end],
            &credentials[..colon],
            &rest[at + 1..]
        ),
        None => url.to_string(),
    }
}
