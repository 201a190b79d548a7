//! Transport seam for the ledger channel
//!
//! The gateway only needs "connect", "send one text frame" and "receive one
//! text frame". Production uses a WebSocket; tests script the conversation.

use async_trait::async_trait;
use futures_util::SinkExt;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::Result;
use crate::TrustSyncError;

/// One open channel to the ledger
#[async_trait]
pub trait LedgerConnection: Send {
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Wait for the next application frame
    async fn recv(&mut self) -> Result<String>;

    /// Whether the peer or a previous error closed the channel
    fn is_closed(&self) -> bool;

    async fn close(&mut self) -> Result<()>;
}

/// Opens new connections on demand
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LedgerConnection>>;

    /// Endpoint description for logs
    fn endpoint(&self) -> String;
}

/// WebSocket connector
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl LedgerConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn LedgerConnection>> {
        let (stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TrustSyncError::LedgerUnavailable(format!("connect {}: {e}", self.url)))?;
        debug!("WebSocket handshake with {} → {}", self.url, response.status());
        Ok(Box::new(WsConnection {
            stream,
            closed: false,
        }))
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WsConnection {
    fn mark_closed(&mut self, reason: &str) -> TrustSyncError {
        self.closed = true;
        TrustSyncError::LedgerUnavailable(reason.to_string())
    }
}

#[async_trait]
impl LedgerConnection for WsConnection {
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.closed {
            return Err(TrustSyncError::LedgerUnavailable(
                "connection already closed".to_string(),
            ));
        }
        if let Err(e) = self.stream.send(Message::Text(frame)).await {
            return Err(self.mark_closed(&format!("send failed: {e}")));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return String::from_utf8(bytes).map_err(|e| {
                        TrustSyncError::LedgerUnavailable(format!("non UTF-8 binary frame: {e}"))
                    });
                }
                // Control frames are answered by tungstenite itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    return Err(self.mark_closed(&format!("closed by peer: {frame:?}")));
                }
                Some(Err(e)) => return Err(self.mark_closed(&format!("receive failed: {e}"))),
                None => return Err(self.mark_closed("stream ended")),
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.close(None).await?;
        Ok(())
    }
}
