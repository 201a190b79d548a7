//! Relational store gateway for `PostgreSQL`
//!
//! The trust store is shared with the external scoring process and with the
//! identity registry. This gateway only ever:
//!
//! - reads trust scores updated since a timestamp (`agent_reputations`)
//! - appends abuse reports (`spam_reports`)
//! - maintains the identity registry (`did_registry`, `did_resolution_log`)
//!
//! Every operation acquires a pooled connection for a single statement; there
//! are no cross-call transactions.
//!
//! # Connection Pool
//!
//! Pooling is managed by `sqlx::PgPool` with configurable maximum and minimum
//! connections and an acquire timeout. A timed-out acquire surfaces as
//! [`TrustSyncError::StoreUnavailable`].

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;

use crate::models::AbuseReport;
use crate::models::TrustScore;
use crate::Result;
use crate::TrustSyncError;

const SCHEMA: &str = include_str!("../../migrations/001_trustsync.sql");

mod abuse_reports;
mod identities;
mod trust_scores;

/// Operations the sync loops need from the trust store
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Scores updated after `since`, newest first, at most `limit` rows
    async fn fetch_updated_scores(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TrustScore>>;

    /// Append one abuse report. Not idempotent.
    async fn persist_abuse_report(&self, report: &AbuseReport) -> Result<()>;
}

/// Database connection pool wrapper
///
/// This type is `Clone`; clones share the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database instance with an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new database instance from configuration
    ///
    /// The pool connects lazily, so a database that is down at startup is
    /// reported by `/health` and retried by the sync loops instead of
    /// aborting the process.
    ///
    /// # Errors
    /// Returns an error if the connection URL cannot be parsed
    pub fn from_config(config: &crate::config::AppConfig) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database.connection_timeout,
            ))
            .connect_lazy(config.database_url())
            .map_err(|e| TrustSyncError::Config(format!("invalid database url: {e}")))?;

        tracing::debug!(
            "Database pool configured: max_connections={}, min_connections={}",
            config.database.max_connections,
            config.database.min_connections
        );

        Ok(Self::new(pool))
    }

    /// Get a reference to the database pool for raw queries
    #[must_use]
    pub const fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }

    /// Create the trustsync tables if they do not exist
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        tracing::info!("Database schema initialized");
        Ok(())
    }

    /// Round-trip `SELECT 1` through the pool
    pub async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database connection pool closed");
    }
}

#[async_trait]
impl TrustStore for Database {
    async fn fetch_updated_scores(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TrustScore>> {
        self.get_updated_trust_scores(since, limit).await
    }

    async fn persist_abuse_report(&self, report: &AbuseReport) -> Result<()> {
        self.insert_abuse_report(report).await
    }
}

/// Classify a `sqlx` failure into the store taxonomy.
///
/// Pool and connection-level failures become `StoreUnavailable`; unique
/// violations become `DuplicateItem`; everything else stays a query error.
pub(crate) fn store_error(err: sqlx::Error) -> TrustSyncError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => TrustSyncError::StoreUnavailable(err.to_string()),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            TrustSyncError::DuplicateItem(db.message().to_string())
        }
        other => TrustSyncError::Database(other),
    }
}
