use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tracing::info;
use tracing::warn;

use super::scheduler::SyncJob;
use super::stats::SyncStats;
use super::types::CycleReport;
use super::types::Direction;
use super::types::ItemOutcome;
use crate::database::TrustStore;
use crate::ledger::FetchedReport;
use crate::ledger::LedgerGateway;
use crate::models::AbuseReport;
use crate::Result;
use crate::TrustSyncError;

/// Copies abuse reports from the ledger into the trust store
pub struct AbuseReportHarvester {
    store: Arc<dyn TrustStore>,
    ledger: Arc<LedgerGateway>,
    stats: Arc<SyncStats>,
}

impl AbuseReportHarvester {
    #[must_use]
    pub fn new(store: Arc<dyn TrustStore>, ledger: Arc<LedgerGateway>, stats: Arc<SyncStats>) -> Self {
        Self {
            store,
            ledger,
            stats,
        }
    }

    /// One harvest cycle over reports recorded after `since`.
    ///
    /// Persisting is append-only, so a report seen by two cycles is stored
    /// twice unless the table enforces uniqueness. Malformed, invalid and
    /// duplicate reports fail individually. An unreachable store fails the
    /// whole cycle so the same window is fetched again after the backoff;
    /// reports stored before the outage are stored again on that retry.
    pub async fn run_cycle(&self, since: DateTime<Utc>) -> Result<CycleReport> {
        let started_at = Utc::now();

        let fetched = self
            .ledger
            .fetch_reports(since)
            .await
            .map_err(|e| TrustSyncError::cycle_failed(Direction::Harvest, &e))?;

        if !fetched.is_empty() {
            info!("Harvesting {} spam reports from ledger", fetched.len());
        }

        let mut outcomes = Vec::with_capacity(fetched.len());
        for entry in fetched {
            let report = match entry {
                FetchedReport::Valid(report) => report,
                FetchedReport::Malformed { key, reason } => {
                    outcomes.push(ItemOutcome::failed(key, started_at, reason));
                    continue;
                }
            };

            let outcome = match self.persist(&report).await {
                Ok(()) => ItemOutcome::synced(&report.message_hash, report.reported_at),
                Err(e) if e.is_retryable() => {
                    return Err(TrustSyncError::cycle_failed(Direction::Harvest, &e));
                }
                Err(e) => {
                    warn!(
                        "Spam report {} against {} not stored: {}",
                        report.message_hash, report.spammer_did, e
                    );
                    ItemOutcome::failed(&report.message_hash, report.reported_at, e.to_string())
                }
            };
            outcomes.push(outcome);
        }

        let report = CycleReport {
            direction: Direction::Harvest,
            since,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        self.stats
            .record_harvest_cycle(report.succeeded(), report.failed(), report.finished_at);

        info!("{}", report.summary());
        Ok(report)
    }

    async fn persist(&self, report: &AbuseReport) -> Result<()> {
        report.validate()?;
        self.store.persist_abuse_report(report).await
    }
}

#[async_trait]
impl SyncJob for AbuseReportHarvester {
    fn direction(&self) -> Direction {
        Direction::Harvest
    }

    async fn run_cycle(&self, since: DateTime<Utc>) -> Result<CycleReport> {
        Self::run_cycle(self, since).await
    }
}
