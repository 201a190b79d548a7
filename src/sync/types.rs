//! Shared types for the sync engine

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Direction of a sync loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Trust store → ledger (trust scores)
    Publish,
    /// Ledger → trust store (abuse reports)
    Harvest,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Harvest => "harvest",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a direction's watermark moves after a successful cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPolicy {
    /// Advance to the wall clock at cycle completion.
    ///
    /// Items stamped between the fetch snapshot and completion can be skipped.
    #[default]
    CompletionTime,
    /// Advance to the newest timestamp among successfully processed items
    MaxObserved,
}

/// Result of processing a single item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ItemResult {
    Synced,
    Failed(String),
}

/// Per-item record inside a cycle report
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    /// Identity for scores, message fingerprint for reports
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub result: ItemResult,
}

impl ItemOutcome {
    #[must_use]
    pub fn synced(key: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            timestamp,
            result: ItemResult::Synced,
        }
    }

    #[must_use]
    pub fn failed(key: impl Into<String>, timestamp: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timestamp,
            result: ItemResult::Failed(reason.into()),
        }
    }

    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self.result, ItemResult::Synced)
    }
}

/// Outcome of one full cycle in one direction
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub direction: Direction,
    pub since: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ItemOutcome>,
}

impl CycleReport {
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_synced()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.batch_size() - self.succeeded()
    }

    /// Newest timestamp among successfully processed items
    #[must_use]
    pub fn high_water(&self) -> Option<DateTime<Utc>> {
        self.outcomes
            .iter()
            .filter(|o| o.is_synced())
            .map(|o| o.timestamp)
            .max()
    }

    /// Where the watermark should move under `policy`, if anywhere
    #[must_use]
    pub fn next_watermark(&self, policy: WatermarkPolicy) -> Option<DateTime<Utc>> {
        match policy {
            WatermarkPolicy::CompletionTime => Some(self.finished_at),
            WatermarkPolicy::MaxObserved => self.high_water(),
        }
    }

    /// One-line summary used by the loops and the CLI
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} items synced ({} failed) in {}ms",
            self.direction,
            self.succeeded(),
            self.batch_size(),
            self.failed(),
            (self.finished_at - self.started_at).num_milliseconds()
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use chrono::TimeZone;

    use super::*;

    fn report(outcomes: Vec<ItemOutcome>) -> CycleReport {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        CycleReport {
            direction: Direction::Publish,
            since: start - Duration::hours(1),
            started_at: start,
            finished_at: start + Duration::seconds(3),
            outcomes,
        }
    }

    #[test]
    fn test_counts_and_high_water_ignore_failures() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        let r = report(vec![
            ItemOutcome::synced("d1", base),
            ItemOutcome::failed("d2", base + Duration::minutes(30), "rejected"),
            ItemOutcome::synced("d3", base + Duration::minutes(10)),
        ]);

        assert_eq!(r.batch_size(), 3);
        assert_eq!(r.succeeded(), 2);
        assert_eq!(r.failed(), 1);
        assert_eq!(r.high_water(), Some(base + Duration::minutes(10)));
    }

    #[test]
    fn test_next_watermark_by_policy() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
        let r = report(vec![ItemOutcome::synced("d1", base)]);
        assert_eq!(
            r.next_watermark(WatermarkPolicy::CompletionTime),
            Some(r.finished_at)
        );
        assert_eq!(r.next_watermark(WatermarkPolicy::MaxObserved), Some(base));

        let empty = report(Vec::new());
        assert_eq!(empty.next_watermark(WatermarkPolicy::MaxObserved), None);
    }
}
