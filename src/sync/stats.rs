//! Process-wide sync counters
//!
//! Counters are `prometheus` integer counters, so increments are atomic and
//! the same values back both `/stats` and `/metrics`. The registry belongs to
//! the collector; nothing is registered globally.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use chrono::DateTime;
use chrono::Utc;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use serde::Serialize;

use crate::Result;
use crate::TrustSyncError;

const NO_TIMESTAMP: i64 = i64::MIN;

#[derive(Debug)]
pub struct SyncStats {
    registry: Registry,
    total_syncs: IntCounter,
    harvest_cycles: IntCounter,
    trust_scores_synced: IntCounter,
    trust_scores_failed: IntCounter,
    spam_reports_synced: IntCounter,
    spam_reports_failed: IntCounter,
    errors: IntCounter,
    last_sync_ms: AtomicI64,
    last_harvest_ms: AtomicI64,
    started_at: DateTime<Utc>,
}

/// Read-only copy of the counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_seconds: f64,
    pub started_at: DateTime<Utc>,
    pub total_syncs: u64,
    pub harvest_cycles: u64,
    pub trust_scores_synced: u64,
    pub trust_scores_failed: u64,
    pub spam_reports_synced: u64,
    pub spam_reports_failed: u64,
    pub errors: u64,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_harvest: Option<DateTime<Utc>>,
}

fn counter(registry: &Registry, name: &str, help: &str) -> std::result::Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace("trustsync"))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl SyncStats {
    /// Create a collector with its own registry
    pub fn new() -> Result<Self> {
        Self::build().map_err(|e| TrustSyncError::Custom(format!("metrics registry: {e}")))
    }

    fn build() -> std::result::Result<Self, prometheus::Error> {
        let registry = Registry::new();
        Ok(Self {
            total_syncs: counter(&registry, "sync_cycles_total", "Completed publish cycles")?,
            harvest_cycles: counter(&registry, "harvest_cycles_total", "Completed harvest cycles")?,
            trust_scores_synced: counter(
                &registry,
                "trust_scores_synced_total",
                "Trust scores accepted by the ledger",
            )?,
            trust_scores_failed: counter(
                &registry,
                "trust_scores_failed_total",
                "Trust scores rejected or not delivered",
            )?,
            spam_reports_synced: counter(
                &registry,
                "spam_reports_synced_total",
                "Abuse reports stored in the trust store",
            )?,
            spam_reports_failed: counter(
                &registry,
                "spam_reports_failed_total",
                "Abuse reports that could not be stored",
            )?,
            errors: counter(&registry, "sync_errors_total", "Cycle-level sync failures")?,
            registry,
            last_sync_ms: AtomicI64::new(NO_TIMESTAMP),
            last_harvest_ms: AtomicI64::new(NO_TIMESTAMP),
            started_at: Utc::now(),
        })
    }

    /// Record a finished publish cycle
    pub fn record_publish_cycle(&self, synced: usize, failed: usize, at: DateTime<Utc>) {
        self.total_syncs.inc();
        self.trust_scores_synced.inc_by(synced as u64);
        self.trust_scores_failed.inc_by(failed as u64);
        self.last_sync_ms.store(at.timestamp_millis(), Ordering::Release);
    }

    /// Record a finished harvest cycle
    pub fn record_harvest_cycle(&self, synced: usize, failed: usize, at: DateTime<Utc>) {
        self.harvest_cycles.inc();
        self.spam_reports_synced.inc_by(synced as u64);
        self.spam_reports_failed.inc_by(failed as u64);
        self.last_harvest_ms
            .store(at.timestamp_millis(), Ordering::Release);
    }

    /// Record a cycle that failed as a whole
    pub fn record_error(&self) {
        self.errors.inc();
    }

    #[must_use]
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        load_timestamp(&self.last_sync_ms)
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_seconds: self.uptime_seconds(),
            started_at: self.started_at,
            total_syncs: self.total_syncs.get(),
            harvest_cycles: self.harvest_cycles.get(),
            trust_scores_synced: self.trust_scores_synced.get(),
            trust_scores_failed: self.trust_scores_failed.get(),
            spam_reports_synced: self.spam_reports_synced.get(),
            spam_reports_failed: self.spam_reports_failed.get(),
            errors: self.errors.get(),
            last_sync: self.last_sync(),
            last_harvest: load_timestamp(&self.last_harvest_ms),
        }
    }

    /// Prometheus text exposition of all counters
    pub fn render_metrics(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| TrustSyncError::Custom(format!("metrics encoding: {e}")))?;
        String::from_utf8(buffer).map_err(|e| TrustSyncError::Custom(e.to_string()))
    }
}

fn load_timestamp(cell: &AtomicI64) -> Option<DateTime<Utc>> {
    match cell.load(Ordering::Acquire) {
        NO_TIMESTAMP => None,
        ms => DateTime::from_timestamp_millis(ms),
    }
}

impl StatsSnapshot {
    /// Format stats for display
    #[must_use]
    pub fn format(&self) -> String {
        format!(
            "Cycles: {}, Scores synced: {} (failed {}), Reports synced: {} (failed {}), Errors: {}, Last Sync: {}",
            self.total_syncs,
            self.trust_scores_synced,
            self.trust_scores_failed,
            self.spam_reports_synced,
            self.spam_reports_failed,
            self.errors,
            self.last_sync.map_or_else(
                || "Never".to_string(),
                |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = SyncStats::new().unwrap();
        assert!(stats.last_sync().is_none());

        let at = Utc::now();
        stats.record_publish_cycle(3, 2, at);
        stats.record_publish_cycle(1, 0, at);
        stats.record_harvest_cycle(4, 1, at);
        stats.record_error();

        let snap = stats.snapshot();
        assert_eq!(snap.total_syncs, 2);
        assert_eq!(snap.trust_scores_synced, 4);
        assert_eq!(snap.trust_scores_failed, 2);
        assert_eq!(snap.harvest_cycles, 1);
        assert_eq!(snap.spam_reports_synced, 4);
        assert_eq!(snap.spam_reports_failed, 1);
        assert_eq!(snap.errors, 1);
        assert_eq!(
            snap.last_sync.map(|t| t.timestamp_millis()),
            Some(at.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let stats = Arc::new(SyncStats::new().unwrap());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = stats.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..250 {
                    stats.record_harvest_cycle(1, 0, Utc::now());
                    stats.record_error();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.spam_reports_synced, 2000);
        assert_eq!(snap.errors, 2000);
    }

    #[test]
    fn test_render_metrics_uses_private_registry() {
        let first = SyncStats::new().unwrap();
        let second = SyncStats::new().unwrap();
        first.record_publish_cycle(5, 0, Utc::now());

        let text = first.render_metrics().unwrap();
        assert!(text.contains("trustsync_trust_scores_synced_total 5"));
        assert!(second
            .render_metrics()
            .unwrap()
            .contains("trustsync_trust_scores_synced_total 0"));
    }
}
