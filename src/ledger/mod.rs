//! Remote ledger gateway
//!
//! Owns the single persistent RPC channel to the ledger conductor. The
//! channel carries no correlation ids, so exactly one call may be in flight:
//! every call holds the connection slot's async mutex from connect through
//! send and receive. Callers in both sync directions can share one gateway
//! without interleaving requests and responses.
//!
//! ```text
//! Disconnected ──call──▶ Connecting ──ok──▶ Connected ──close()──▶ Closed
//!      ▲                     │                  │
//!      └──── connect error ──┘◀── send/recv error
//! ```

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use tokio::sync::watch;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::AppConfig;
use crate::models::AbuseReport;
use crate::models::TrustScore;
use crate::Result;
use crate::TrustSyncError;

pub mod envelope;
pub mod transport;

pub use envelope::CallRequest;
pub use envelope::CallResponse;
pub use envelope::CallTarget;
pub use transport::LedgerConnection;
pub use transport::LedgerConnector;
pub use transport::WsConnector;

/// Ledger function receiving trust score updates
pub const UPDATE_TRUST_SCORE: &str = "update_trust_score";
/// Ledger function listing abuse reports newer than a timestamp
pub const GET_SPAM_REPORTS: &str = "get_spam_reports";

/// One element of a `get_spam_reports` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedReport {
    Valid(AbuseReport),
    /// Element that does not decode as a report; `key` is its
    /// `message_hash` when it has one, else its position in the payload
    Malformed { key: String, reason: String },
}

fn decode_reports(data: Value) -> Result<Vec<FetchedReport>> {
    let entries: Vec<Value> = match data {
        Value::Null => return Ok(Vec::new()),
        data => serde_json::from_value(data)?,
    };

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let key = entry
                .get("message_hash")
                .and_then(Value::as_str)
                .map_or_else(|| format!("#{index}"), str::to_string);
            match serde_json::from_value::<AbuseReport>(entry) {
                Ok(report) => FetchedReport::Valid(report),
                Err(e) => {
                    let reason =
                        TrustSyncError::ItemRejected(format!("malformed spam report: {e}"))
                            .to_string();
                    warn!("Spam report {} skipped: {}", key, reason);
                    FetchedReport::Malformed { key, reason }
                }
            }
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

type Slot = Option<Box<dyn LedgerConnection>>;

pub struct LedgerGateway {
    connector: Arc<dyn LedgerConnector>,
    target: CallTarget,
    call_timeout: Option<Duration>,
    connection: Mutex<Slot>,
    state: watch::Sender<ConnectionState>,
    calls: AtomicU64,
}

impl std::fmt::Debug for LedgerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerGateway")
            .field("endpoint", &self.connector.endpoint())
            .field("target", &self.target)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl LedgerGateway {
    #[must_use]
    pub fn new(
        connector: Arc<dyn LedgerConnector>,
        target: CallTarget,
        call_timeout: Option<Duration>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            target,
            call_timeout,
            connection: Mutex::new(None),
            state,
            calls: AtomicU64::new(0),
        }
    }

    /// Gateway over a WebSocket to the configured endpoint. Does not connect yet.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let target = CallTarget {
            app_id: config.ledger.app_id.clone(),
            role_name: config.ledger.role_name.clone(),
            zome: config.ledger.zome.clone(),
        };
        Self::new(
            Arc::new(WsConnector::new(config.ledger.url.clone())),
            target,
            config.ledger_call_timeout(),
        )
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state transitions
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Number of raw calls attempted since startup
    #[must_use]
    pub fn calls_attempted(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("ledger connection {:?} → {:?}", previous, next);
        }
    }

    /// Make sure the slot holds an open connection, reconnecting if needed
    async fn ensure_connected<'a>(
        &self,
        slot: &'a mut Slot,
    ) -> Result<&'a mut Box<dyn LedgerConnection>> {
        let usable = slot.as_ref().is_some_and(|conn| !conn.is_closed());
        if !usable {
            if slot.take().is_some() {
                warn!("Ledger connection reported closed, reconnecting");
                self.set_state(ConnectionState::Disconnected);
            }
            self.set_state(ConnectionState::Connecting);
            info!("Connecting to ledger at {}", self.connector.endpoint());
            match self.connector.connect().await {
                Ok(conn) => {
                    *slot = Some(conn);
                    self.set_state(ConnectionState::Connected);
                    info!("Connected to ledger");
                }
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    return Err(match e {
                        TrustSyncError::LedgerUnavailable(_) => e,
                        other => TrustSyncError::LedgerUnavailable(other.to_string()),
                    });
                }
            }
        }
        slot.as_mut()
            .ok_or_else(|| TrustSyncError::LedgerUnavailable("no connection".to_string()))
    }

    /// Raw call: serialize, send, wait for exactly one response, decode.
    ///
    /// Any transport or decode failure drops the connection so the next
    /// call starts from a clean channel. A transport failure on a connection
    /// kept from an earlier call is retried once on a fresh connection, since
    /// the peer may have dropped it while idle. A `LedgerUnavailable` result
    /// therefore means a freshly opened channel failed too.
    pub async fn call(&self, function: &str, payload: Value) -> Result<CallResponse> {
        let mut slot = self.connection.lock().await;
        self.calls.fetch_add(1, Ordering::Relaxed);

        let frame = CallRequest::new(&self.target, function, payload).encode()?;
        let reused = slot.as_ref().is_some_and(|conn| !conn.is_closed());

        match self.exchange(&mut slot, function, &frame).await {
            Err(e) if reused && e.is_retryable() => {
                warn!("Ledger connection went stale ({}), reconnecting", e);
                self.exchange(&mut slot, function, &frame).await
            }
            outcome => outcome,
        }
    }

    async fn exchange(&self, slot: &mut Slot, function: &str, frame: &str) -> Result<CallResponse> {
        let conn = self.ensure_connected(slot).await?;

        let exchange = async {
            conn.send(frame.to_string()).await?;
            let text = conn.recv().await?;
            Ok::<_, TrustSyncError>(CallResponse::decode(&text)?)
        };
        let outcome = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or_else(|_| {
                    Err(TrustSyncError::LedgerUnavailable(format!(
                        "{function} timed out after {}s",
                        limit.as_secs()
                    )))
                }),
            None => exchange.await,
        };

        if outcome.is_err() {
            // Drop without a close handshake; the peer may already be gone
            *slot = None;
            self.set_state(ConnectionState::Disconnected);
        }
        outcome
    }

    /// Push one trust score to the ledger.
    ///
    /// Scores outside `[0.0, 1.0]` are rejected before any network activity.
    pub async fn publish_score(&self, score: &TrustScore) -> Result<()> {
        score.validate()?;

        let payload = json!({
            "did": score.did,
            "score": score.composite_score,
            "timestamp": score.updated_at.timestamp(),
        });
        let response = self.call(UPDATE_TRUST_SCORE, payload).await?;

        if response.is_success() {
            debug!(
                "Synced trust score for {}: {:.3}",
                score.did, score.composite_score
            );
            Ok(())
        } else {
            error!("Failed to sync {}: {}", score.did, response.data);
            Err(TrustSyncError::LedgerRejected {
                function: UPDATE_TRUST_SCORE.to_string(),
                detail: response.data.to_string(),
            })
        }
    }

    /// List abuse reports recorded after `since`.
    ///
    /// A non-success envelope or a payload that is not a list is an error,
    /// not an empty list, so the caller keeps its watermark. Elements are
    /// decoded one by one; a malformed element comes back as
    /// [`FetchedReport::Malformed`] next to the valid ones.
    pub async fn fetch_reports(&self, since: DateTime<Utc>) -> Result<Vec<FetchedReport>> {
        let response = self
            .call(GET_SPAM_REPORTS, json!({ "since": since.timestamp() }))
            .await?;

        if !response.is_success() {
            error!("Failed to fetch spam reports: {}", response.data);
            return Err(TrustSyncError::LedgerRejected {
                function: GET_SPAM_REPORTS.to_string(),
                detail: response.data.to_string(),
            });
        }

        decode_reports(response.data)
    }

    /// Close the channel. A later call reconnects.
    pub async fn close(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        if let Some(mut conn) = slot.take() {
            if let Err(e) = conn.close().await {
                warn!("Error while closing ledger connection: {}", e);
            }
            info!("Ledger connection closed");
        }
        self.set_state(ConnectionState::Closed);
        Ok(())
    }
}
