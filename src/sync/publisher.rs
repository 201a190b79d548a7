use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::scheduler::SyncJob;
use super::stats::SyncStats;
use super::types::CycleReport;
use super::types::Direction;
use super::types::ItemOutcome;
use crate::database::TrustStore;
use crate::ledger::LedgerGateway;
use crate::Result;
use crate::TrustSyncError;

/// Pushes updated trust scores from the store to the ledger, one call per score
pub struct TrustScorePublisher {
    store: Arc<dyn TrustStore>,
    ledger: Arc<LedgerGateway>,
    stats: Arc<SyncStats>,
    batch_limit: i64,
}

impl TrustScorePublisher {
    #[must_use]
    pub fn new(
        store: Arc<dyn TrustStore>,
        ledger: Arc<LedgerGateway>,
        stats: Arc<SyncStats>,
        batch_limit: i64,
    ) -> Self {
        Self {
            store,
            ledger,
            stats,
            batch_limit,
        }
    }

    /// One publish cycle over scores updated after `since`.
    ///
    /// A failed fetch fails the cycle, and so does an unreachable ledger:
    /// the batch stops at the first score the gateway cannot deliver even
    /// after reconnecting. Rejected and out-of-range scores are recorded in
    /// the report and the batch continues.
    pub async fn run_cycle(&self, since: DateTime<Utc>) -> Result<CycleReport> {
        let started_at = Utc::now();

        let scores = self
            .store
            .fetch_updated_scores(since, self.batch_limit)
            .await
            .map_err(|e| TrustSyncError::cycle_failed(Direction::Publish, &e))?;

        if scores.is_empty() {
            debug!("No trust score updates since {}", since);
        } else {
            info!("Syncing {} trust scores to ledger", scores.len());
        }

        let mut outcomes = Vec::with_capacity(scores.len());
        for score in &scores {
            let outcome = match self.ledger.publish_score(score).await {
                Ok(()) => ItemOutcome::synced(&score.did, score.updated_at),
                Err(e) if e.is_retryable() => {
                    return Err(TrustSyncError::cycle_failed(Direction::Publish, &e));
                }
                Err(e) => {
                    warn!("Trust score for {} not synced: {}", score.did, e);
                    ItemOutcome::failed(&score.did, score.updated_at, e.to_string())
                }
            };
            outcomes.push(outcome);
        }

        let report = CycleReport {
            direction: Direction::Publish,
            since,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        self.stats
            .record_publish_cycle(report.succeeded(), report.failed(), report.finished_at);

        info!("{}", report.summary());
        Ok(report)
    }
}

#[async_trait]
impl SyncJob for TrustScorePublisher {
    fn direction(&self) -> Direction {
        Direction::Publish
    }

    async fn run_cycle(&self, since: DateTime<Utc>) -> Result<CycleReport> {
        Self::run_cycle(self, since).await
    }
}
