//! Periodic sync loops
//!
//! Each direction runs as its own task: run a cycle, advance the watermark
//! on success, then sleep for the interval (or the shorter backoff after a
//! failed cycle). Sleeps race the cancellation token, so shutdown never waits
//! out an interval. A cycle already in flight is allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::stats::SyncStats;
use super::types::CycleReport;
use super::types::Direction;
use super::types::WatermarkPolicy;
use super::watermark::WatermarkTracker;
use crate::config::AppConfig;
use crate::Result;
use crate::TrustSyncError;

/// One direction's cycle
#[async_trait]
pub trait SyncJob: Send + Sync {
    fn direction(&self) -> Direction;

    async fn run_cycle(&self, since: DateTime<Utc>) -> Result<CycleReport>;
}

/// Timing and watermark settings shared by both loops
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub interval: Duration,
    pub error_backoff: Duration,
    pub policy: WatermarkPolicy,
}

impl LoopSettings {
    #[must_use]
    pub const fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: config.sync_interval(),
            error_backoff: config.error_backoff(),
            policy: config.sync.watermark_policy,
        }
    }
}

/// Run `job` until `cancel` fires.
///
/// Cycle-level failures are logged, counted and followed by the backoff
/// sleep; the watermark stays where it was so the next attempt refetches
/// the same window.
pub async fn run_loop(
    job: Arc<dyn SyncJob>,
    watermarks: Arc<WatermarkTracker>,
    stats: Arc<SyncStats>,
    settings: LoopSettings,
    cancel: CancellationToken,
) {
    let direction = job.direction();
    info!(
        "Starting {} loop (interval {}s, backoff {}s, watermark {:?})",
        direction,
        settings.interval.as_secs(),
        settings.error_backoff.as_secs(),
        settings.policy
    );

    while !cancel.is_cancelled() {
        let since = watermarks.current(direction).await;

        let pause = match job.run_cycle(since).await {
            Ok(report) => {
                if let Some(next) = report.next_watermark(settings.policy) {
                    watermarks.advance(direction, next).await;
                }
                settings.interval
            }
            Err(e) => {
                let e = match e {
                    TrustSyncError::CycleFailed { .. } => e,
                    other => TrustSyncError::cycle_failed(direction, &other),
                };
                error!("Sync error: {}", e);
                stats.record_error();
                settings.error_backoff
            }
        };

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(pause) => {}
        }
    }

    info!("{} loop stopped", direction);
}

/// Handles to the running loops
pub struct SyncScheduler {
    tasks: Vec<(Direction, JoinHandle<()>)>,
    cancel: CancellationToken,
}

impl SyncScheduler {
    /// Spawn one loop per job. Each loop gets a child of `cancel`.
    #[must_use]
    pub fn spawn(
        jobs: Vec<Arc<dyn SyncJob>>,
        watermarks: &Arc<WatermarkTracker>,
        stats: &Arc<SyncStats>,
        settings: LoopSettings,
        cancel: &CancellationToken,
    ) -> Self {
        let cancel = cancel.child_token();
        let tasks = jobs
            .into_iter()
            .map(|job| {
                let direction = job.direction();
                let handle = tokio::spawn(run_loop(
                    job,
                    Arc::clone(watermarks),
                    Arc::clone(stats),
                    settings,
                    cancel.clone(),
                ));
                (direction, handle)
            })
            .collect();
        Self { tasks, cancel }
    }

    #[must_use]
    pub fn directions(&self) -> Vec<Direction> {
        self.tasks.iter().map(|(d, _)| *d).collect()
    }

    /// Stop all loops and wait for them to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (direction, handle) in self.tasks {
            if let Err(e) = handle.await {
                warn!("{} loop ended abnormally: {}", direction, e);
            }
        }
    }
}
