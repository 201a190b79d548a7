//! Cross-module scenario tests against in-memory ledger and store stubs

mod harvest_test;
mod service_test;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::models::AbuseReport;
use crate::models::TrustScore;

pub fn score(did: &str, composite: f64, updated_at: DateTime<Utc>) -> TrustScore {
    TrustScore {
        did: did.to_string(),
        composite_score: composite,
        pogq_score: 0.5,
        tcdm_score: 0.5,
        entropy_score: 0.5,
        updated_at,
    }
}

pub fn report(spammer: &str, message_hash: &str, reported_at: DateTime<Utc>) -> AbuseReport {
    AbuseReport {
        reporter_did: "did:key:reporter".to_string(),
        spammer_did: spammer.to_string(),
        message_hash: message_hash.to_string(),
        reason: "spam".to_string(),
        reported_at,
    }
}

/// A timestamp inside the default look-back windows
pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}
