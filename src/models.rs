//! Data models shared by the store gateway, the ledger gateway and the API

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

use crate::Result;
use crate::TrustSyncError;

/// Computed trust score for one identity, as read from the trust store.
///
/// A newer update produces a new record with a newer `updated_at`; records
/// are never mutated after they are fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrustScore {
    pub did: String,
    pub composite_score: f64,
    pub pogq_score: f64,
    pub tcdm_score: f64,
    pub entropy_score: f64,
    pub updated_at: DateTime<Utc>,
}

impl TrustScore {
    /// Reject identities without a key and any score outside `[0.0, 1.0]`.
    ///
    /// Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if self.did.trim().is_empty() {
            return Err(TrustSyncError::ItemRejected(
                "trust score has an empty identity key".to_string(),
            ));
        }
        for (name, value) in [
            ("composite_score", self.composite_score),
            ("pogq_score", self.pogq_score),
            ("tcdm_score", self.tcdm_score),
            ("entropy_score", self.entropy_score),
        ] {
            if !is_unit_interval(value) {
                return Err(TrustSyncError::ItemRejected(format!(
                    "{name} for {} is outside [0.0, 1.0]: {value}",
                    self.did
                )));
            }
        }
        Ok(())
    }
}

fn is_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Abuse report recorded on the ledger and copied into the trust store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbuseReport {
    pub reporter_did: String,
    pub spammer_did: String,
    pub message_hash: String,
    #[serde(default)]
    pub reason: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub reported_at: DateTime<Utc>,
}

impl AbuseReport {
    pub fn validate(&self) -> Result<()> {
        if self.reporter_did.trim().is_empty() || self.spammer_did.trim().is_empty() {
            return Err(TrustSyncError::ItemRejected(format!(
                "abuse report {} is missing an identity",
                self.message_hash
            )));
        }
        if self.message_hash.trim().is_empty() {
            return Err(TrustSyncError::ItemRejected(format!(
                "abuse report against {} has no message fingerprint",
                self.spammer_did
            )));
        }
        Ok(())
    }
}

/// Ledger timestamps arrive either as RFC 3339 text or Unix seconds,
/// whole or fractional.
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Seconds(i64),
        Fractional(f64),
        Text(String),
    }

    let invalid = |shown: &dyn std::fmt::Display| -> D::Error {
        serde::de::Error::custom(format!(
            "reported_at must be RFC 3339 text or Unix seconds, got {shown}"
        ))
    };

    let raw = RawTimestamp::deserialize(deserializer)
        .map_err(|_| invalid(&"a value that is neither a number nor a string"))?;
    match raw {
        RawTimestamp::Seconds(secs) => DateTime::from_timestamp(secs, 0).ok_or_else(|| invalid(&secs)),
        RawTimestamp::Fractional(secs) => from_fractional_seconds(secs).ok_or_else(|| invalid(&secs)),
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| invalid(&format!("{text:?}"))),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn from_fractional_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Active identity mapping from a DID to a ledger agent key
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityRecord {
    pub did: String,
    pub agent_pubkey: String,
    pub display_name: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Registration request for a new identity mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIdentity {
    pub did: String,
    pub agent_pubkey: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_alias: Option<String>,
}

/// Parsed `did:<method>:<identifier>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidParts<'a> {
    pub method: &'a str,
    pub identifier: &'a str,
}

/// Split a DID into method and method-specific identifier.
pub fn parse_did(did: &str) -> Result<DidParts<'_>> {
    let Some(rest) = did.strip_prefix("did:") else {
        return Err(TrustSyncError::ItemRejected(
            "DID must start with \"did:\"".to_string(),
        ));
    };
    match rest.split_once(':') {
        Some((method, identifier)) if !method.is_empty() && !identifier.is_empty() => {
            Ok(DidParts { method, identifier })
        }
        _ => Err(TrustSyncError::ItemRejected(
            "DID must have format did:method:identifier".to_string(),
        )),
    }
}

/// Agent keys use the ledger's base64 agent-key prefix.
pub fn validate_agent_pubkey(key: &str) -> Result<()> {
    if key.starts_with("uhCAk") {
        Ok(())
    } else {
        Err(TrustSyncError::ItemRejected(
            "AgentPubKey must start with \"uhCAk\"".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn score(composite: f64) -> TrustScore {
        TrustScore {
            did: "did:key:z6Mk1".to_string(),
            composite_score: composite,
            pogq_score: 0.5,
            tcdm_score: 0.5,
            entropy_score: 0.5,
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_score_bounds_inclusive() {
        assert!(score(0.0).validate().is_ok());
        assert!(score(1.0).validate().is_ok());
        assert!(score(0.85).validate().is_ok());
    }

    #[test]
    fn test_out_of_range_scores_rejected() {
        for bad in [1.5, -0.01, f64::NAN, f64::INFINITY] {
            let err = score(bad).validate().unwrap_err();
            assert!(matches!(err, TrustSyncError::ItemRejected(_)), "{bad}");
        }

        let mut sub = score(0.5);
        sub.entropy_score = 1.2;
        assert!(sub.validate().is_err());
    }

    #[test]
    fn test_report_timestamp_formats() {
        let from_secs: AbuseReport = serde_json::from_value(serde_json::json!({
            "reporter_did": "did:key:a",
            "spammer_did": "did:key:b",
            "message_hash": "uhCkk123",
            "reason": "phishing",
            "reported_at": 1_714_564_800
        }))
        .unwrap();
        let from_text: AbuseReport = serde_json::from_value(serde_json::json!({
            "reporter_did": "did:key:a",
            "spammer_did": "did:key:b",
            "message_hash": "uhCkk123",
            "reason": "phishing",
            "reported_at": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(from_secs.reported_at, from_text.reported_at);
    }

    fn report_at(reported_at: serde_json::Value) -> serde_json::Result<AbuseReport> {
        serde_json::from_value(serde_json::json!({
            "reporter_did": "did:key:a",
            "spammer_did": "did:key:b",
            "message_hash": "uhCkk123",
            "reported_at": reported_at
        }))
    }

    #[test]
    fn test_report_fractional_seconds() {
        let report = report_at(serde_json::json!(1_714_564_800.5)).unwrap();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(report.reported_at, base + chrono::Duration::milliseconds(500));
    }

    #[test]
    fn test_bad_report_timestamp_names_field_and_value() {
        let err = report_at(serde_json::json!("yesterday")).unwrap_err().to_string();
        assert!(err.contains("reported_at"), "{err}");
        assert!(err.contains("\"yesterday\""), "{err}");

        let err = report_at(serde_json::json!(1e300)).unwrap_err().to_string();
        assert!(err.contains("reported_at"), "{err}");

        let err = report_at(serde_json::json!(true)).unwrap_err().to_string();
        assert!(err.contains("reported_at"), "{err}");
    }

    #[test]
    fn test_report_without_fingerprint_rejected() {
        let report = AbuseReport {
            reporter_did: "did:key:a".to_string(),
            spammer_did: "did:key:b".to_string(),
            message_hash: String::new(),
            reason: String::new(),
            reported_at: Utc::now(),
        };
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_parse_did() {
        let parts = parse_did("did:web:example.com:alice").unwrap();
        assert_eq!(parts.method, "web");
        assert_eq!(parts.identifier, "example.com:alice");

        assert!(parse_did("web:example.com").is_err());
        assert!(parse_did("did:web").is_err());
        assert!(parse_did("did::abc").is_err());
    }

    #[test]
    fn test_agent_pubkey_prefix() {
        assert!(validate_agent_pubkey("uhCAkXyz").is_ok());
        assert!(validate_agent_pubkey("abc").is_err());
    }
}
