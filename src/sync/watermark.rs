//! In-memory watermark tracking, one timestamp per sync direction

use std::collections::HashMap;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use tokio::sync::RwLock;

use super::types::Direction;

/// Last successfully synchronized boundary per direction.
///
/// Progress lives only in process memory; a restart falls back to the
/// configured look-back window for each direction.
#[derive(Debug)]
pub struct WatermarkTracker {
    marks: RwLock<HashMap<Direction, DateTime<Utc>>>,
    publish_lookback: Duration,
    harvest_lookback: Duration,
}

impl WatermarkTracker {
    #[must_use]
    pub fn new(publish_lookback: Duration, harvest_lookback: Duration) -> Self {
        Self {
            marks: RwLock::new(HashMap::new()),
            publish_lookback,
            harvest_lookback,
        }
    }

    /// Tracker with the default look-backs (24h for scores, 1h for reports)
    #[must_use]
    pub fn with_default_lookback() -> Self {
        Self::new(Duration::hours(24), Duration::hours(1))
    }

    const fn lookback(&self, direction: Direction) -> Duration {
        match direction {
            Direction::Publish => self.publish_lookback,
            Direction::Harvest => self.harvest_lookback,
        }
    }

    /// Current watermark; the first read pins `now - lookback` for the direction.
    pub async fn current(&self, direction: Direction) -> DateTime<Utc> {
        if let Some(mark) = self.marks.read().await.get(&direction) {
            return *mark;
        }
        let mut marks = self.marks.write().await;
        *marks
            .entry(direction)
            .or_insert_with(|| Utc::now() - self.lookback(direction))
    }

    /// Stored watermark without initializing a default
    pub async fn peek(&self, direction: Direction) -> Option<DateTime<Utc>> {
        self.marks.read().await.get(&direction).copied()
    }

    /// Move the watermark forward. Returns `false` (and changes nothing) when
    /// `timestamp` is not strictly newer than the current value.
    pub async fn advance(&self, direction: Direction, timestamp: DateTime<Utc>) -> bool {
        let lookback = self.lookback(direction);
        let mut marks = self.marks.write().await;
        let current = marks
            .entry(direction)
            .or_insert_with(|| Utc::now() - lookback);
        if timestamp > *current {
            tracing::debug!("{} watermark {} -> {}", direction, current, timestamp);
            *current = timestamp;
            true
        } else {
            false
        }
    }

    /// Both watermarks, for reporting
    pub async fn snapshot(&self) -> HashMap<Direction, DateTime<Utc>> {
        self.marks.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    #[tokio::test]
    async fn test_first_read_uses_direction_lookback() {
        let tracker = WatermarkTracker::with_default_lookback();
        let before = Utc::now();

        let publish = tracker.current(Direction::Publish).await;
        let harvest = tracker.current(Direction::Harvest).await;

        let publish_age = before - publish;
        let harvest_age = before - harvest;
        assert!(publish_age >= Duration::hours(24) - Duration::seconds(5));
        assert!(publish_age <= Duration::hours(24) + Duration::seconds(5));
        assert!(harvest_age >= Duration::hours(1) - Duration::seconds(5));
        assert!(harvest_age <= Duration::hours(1) + Duration::seconds(5));

        // The default is pinned, not recomputed on every read
        assert_eq!(tracker.current(Direction::Publish).await, publish);
    }

    #[tokio::test]
    async fn test_advance_never_regresses() {
        let tracker = WatermarkTracker::with_default_lookback();
        let t1 = Utc::now();
        let t0 = t1 - Duration::minutes(5);

        assert!(tracker.advance(Direction::Harvest, t1).await);
        assert!(!tracker.advance(Direction::Harvest, t0).await);
        assert!(!tracker.advance(Direction::Harvest, t1).await);
        assert_eq!(tracker.current(Direction::Harvest).await, t1);

        // Directions are independent
        assert!(tracker.peek(Direction::Publish).await.is_none());
    }

    proptest! {
        #[test]
        fn prop_current_is_non_decreasing(offsets in proptest::collection::vec(-100_000i64..100_000, 1..64)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let tracker = WatermarkTracker::with_default_lookback();
                let anchor = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
                let mut last = tracker.current(Direction::Publish).await;
                for offset in offsets {
                    tracker.advance(Direction::Publish, anchor + Duration::seconds(offset)).await;
                    let now = tracker.current(Direction::Publish).await;
                    prop_assert!(now >= last);
                    last = now;
                }
                Ok(())
            })?;
        }
    }
}
