//! `TrustSync` - bidirectional trust synchronization between a relational
//! trust store and a remote ledger
//!
//! Two periodic loops share one service context:
//!
//! - **Publish**: trust scores updated in `PostgreSQL` are pushed to the
//!   ledger's `trust_filter` module, one RPC call per score.
//! - **Harvest**: abuse reports recorded on the ledger are copied into the
//!   trust store.
//!
//! Each direction keeps an in-memory watermark, processes items with
//! continue-on-error and reports per-item results. An axum server exposes
//! health, stats and Prometheus metrics next to a small identity registry.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trustsync::{AppConfig, TrustSync};
//!
//! #[tokio::main]
//! async fn main() -> trustsync::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let service = TrustSync::new(&config)?;
//!
//!     let report = service.run_publish_cycle(None).await?;
//!     println!("{}", report.summary());
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            CLI / HTTP surface               │
//! ├─────────────────────────────────────────────┤
//! │      TrustSync (service context)            │
//! ├──────────────────────┬──────────────────────┤
//! │  Publisher / Harvester + Scheduler          │
//! ├──────────────────────┬──────────────────────┤
//! │  Database (sqlx)     │  LedgerGateway (ws)  │
//! └──────────────────────┴──────────────────────┘
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`] with [`TrustSyncError`].

#![allow(clippy::doc_markdown)]

pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod errors;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod sync;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
pub use config::AppConfig;
pub use database::Database;
pub use database::TrustStore;
pub use errors::*;
pub use ledger::ConnectionState;
pub use ledger::LedgerGateway;
pub use models::*;
pub use sync::CycleReport;
pub use sync::Direction;
pub use sync::SyncStats;
pub use sync::WatermarkTracker;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::sync::AbuseReportHarvester;
use crate::sync::LoopSettings;
use crate::sync::SyncJob;
use crate::sync::SyncScheduler;
use crate::sync::TrustScorePublisher;

/// Service context shared by the sync loops, the CLI and the HTTP surface
pub struct TrustSync {
    config: Arc<AppConfig>,
    database: Arc<Database>,
    ledger: Arc<LedgerGateway>,
    stats: Arc<SyncStats>,
    watermarks: Arc<WatermarkTracker>,
    cancel: CancellationToken,
}

impl TrustSync {
    /// Build the context from configuration.
    ///
    /// Neither the pool nor the ledger channel connects here; both connect on
    /// first use.
    ///
    /// # Errors
    /// Returns error if the database URL cannot be parsed or the metrics
    /// registry cannot be built
    pub fn new(config: &AppConfig) -> Result<Self> {
        let database = Database::from_config(config)?;
        let ledger = LedgerGateway::from_config(config);
        Self::from_parts(config, database, ledger)
    }

    /// Build the context around an existing pool and ledger gateway
    ///
    /// # Errors
    /// Returns error if the metrics registry cannot be built
    pub fn from_parts(config: &AppConfig, database: Database, ledger: LedgerGateway) -> Result<Self> {
        let watermarks = WatermarkTracker::new(
            config.lookback(Direction::Publish),
            config.lookback(Direction::Harvest),
        );
        Ok(Self {
            config: Arc::new(config.clone()),
            database: Arc::new(database),
            ledger: Arc::new(ledger),
            stats: Arc::new(SyncStats::new()?),
            watermarks: Arc::new(watermarks),
            cancel: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub const fn database(&self) -> &Arc<Database> {
        &self.database
    }

    #[must_use]
    pub const fn ledger(&self) -> &Arc<LedgerGateway> {
        &self.ledger
    }

    #[must_use]
    pub const fn stats(&self) -> &Arc<SyncStats> {
        &self.stats
    }

    #[must_use]
    pub const fn watermarks(&self) -> &Arc<WatermarkTracker> {
        &self.watermarks
    }

    /// Root token; cancelling it stops the loops and the HTTP server
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn publisher(&self) -> TrustScorePublisher {
        TrustScorePublisher::new(
            self.database.clone(),
            self.ledger.clone(),
            self.stats.clone(),
            self.config.sync.score_batch_limit,
        )
    }

    #[must_use]
    pub fn harvester(&self) -> AbuseReportHarvester {
        AbuseReportHarvester::new(self.database.clone(), self.ledger.clone(), self.stats.clone())
    }

    /// Run a single publish cycle from `since`, or from the current watermark.
    ///
    /// The watermark is left untouched.
    pub async fn run_publish_cycle(&self, since: Option<DateTime<Utc>>) -> Result<CycleReport> {
        let since = match since {
            Some(ts) => ts,
            None => self.watermarks.current(Direction::Publish).await,
        };
        self.publisher().run_cycle(since).await
    }

    /// Run a single harvest cycle from `since`, or from the current watermark.
    ///
    /// The watermark is left untouched.
    pub async fn run_harvest_cycle(&self, since: Option<DateTime<Utc>>) -> Result<CycleReport> {
        let since = match since {
            Some(ts) => ts,
            None => self.watermarks.current(Direction::Harvest).await,
        };
        self.harvester().run_cycle(since).await
    }

    /// Spawn the enabled sync loops under a child of the root token
    #[must_use]
    pub fn spawn_sync_loops(&self) -> SyncScheduler {
        let mut jobs: Vec<Arc<dyn SyncJob>> = Vec::with_capacity(2);
        if self.config.sync.enable_publish {
            jobs.push(Arc::new(self.publisher()));
        }
        if self.config.sync.enable_harvest {
            jobs.push(Arc::new(self.harvester()));
        }
        if jobs.is_empty() {
            warn!("Both sync directions are disabled; only the HTTP surface will run");
        }

        SyncScheduler::spawn(
            jobs,
            &self.watermarks,
            &self.stats,
            LoopSettings::from_config(&self.config),
            &self.cancel,
        )
    }

    /// Run the sync loops and the HTTP surface until Ctrl-C or cancellation,
    /// then shut down gracefully.
    ///
    /// # Errors
    /// Returns error if the listener cannot bind or the server fails
    pub async fn serve(&self, host: &str, port: u16) -> Result<()> {
        let scheduler = self.spawn_sync_loops();

        let signal_token = self.cancel.clone();
        let signal = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    signal_token.cancel();
                }
                Err(e) => warn!("Unable to listen for shutdown signal: {}", e),
            }
        });

        let result = api::serve_api(
            self.app_state(),
            host,
            port,
            self.config.server.enable_cors,
            self.cancel.child_token(),
        )
        .await;

        signal.abort();
        scheduler.shutdown().await;
        self.shutdown().await;
        result
    }

    /// Shared state for the HTTP handlers
    #[must_use]
    pub fn app_state(&self) -> api::AppState {
        api::AppState {
            config: self.config.clone(),
            database: self.database.clone(),
            ledger: self.ledger.clone(),
            stats: self.stats.clone(),
            watermarks: self.watermarks.clone(),
        }
    }

    /// Cancel the loops, close the ledger channel and the pool
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Err(e) = self.ledger.close().await {
            warn!("Ledger shutdown error: {}", e);
        }
        self.database.close().await;
        info!("TrustSync stopped. {}", self.stats.snapshot().format());
    }
}
