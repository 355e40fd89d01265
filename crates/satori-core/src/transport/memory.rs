//! In-process transport.
//!
//! [`MemoryConnector::pair`] returns a connector and the [`EnginePeer`] that
//! plays the engine's side: it reads what the client sent and pushes frames
//! back. The connector hands out its channel once; a second `connect` fails
//! like an unreachable host would.

use super::{Connector, MessageSink, MessageStream};
use crate::{Result, SatoriError};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

type Halves = (MemorySink, MemoryStream);

/// Connector backed by in-process channels.
#[derive(Debug)]
pub struct MemoryConnector {
    halves: Mutex<Option<Halves>>,
}

/// Client-side write half.
#[derive(Debug)]
pub struct MemorySink {
    tx: mpsc::UnboundedSender<String>,
}

/// Client-side read half.
#[derive(Debug)]
pub struct MemoryStream {
    rx: mpsc::UnboundedReceiver<Result<String>>,
}

/// The engine's end of a memory connection.
#[derive(Debug)]
pub struct EnginePeer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: Option<mpsc::UnboundedSender<Result<String>>>,
}

impl MemoryConnector {
    /// Create a connector and its engine-side peer.
    #[must_use]
    pub fn pair() -> (Self, EnginePeer) {
        let (client_tx, from_client) = mpsc::unbounded_channel();
        let (to_client, client_rx) = mpsc::unbounded_channel();
        let connector = Self {
            halves: Mutex::new(Some((
                MemorySink { tx: client_tx },
                MemoryStream { rx: client_rx },
            ))),
        };
        let peer = EnginePeer {
            from_client,
            to_client: Some(to_client),
        };
        (connector, peer)
    }
}

impl Connector for MemoryConnector {
    type Sink = MemorySink;
    type Stream = MemoryStream;

    async fn connect(&self, endpoint: &str) -> Result<Halves> {
        self.halves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                SatoriError::Connection(format!("{}: memory endpoint already used", endpoint))
            })
    }
}

impl MessageSink for MemorySink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.tx
            .send(text)
            .map_err(|_| SatoriError::Transport("memory peer hung up".into()))
    }

    async fn close(&mut self) {}
}

impl MessageStream for MemoryStream {
    async fn recv(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }
}

impl EnginePeer {
    /// Next frame the client sent, as raw text. `None` once the client's
    /// write half is gone.
    pub async fn recv_text(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next frame the client sent, decoded as JSON.
    pub async fn recv_json(&mut self) -> Option<Value> {
        let text = self.recv_text().await?;
        serde_json::from_str(&text).ok()
    }

    /// Push a raw text frame to the client. Returns `false` if the client's
    /// read half is gone or the peer already hung up.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(text.into())).is_ok())
    }

    /// Push a JSON frame to the client.
    pub fn send_json(&self, value: &Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Fail the client's next read with a transport error.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(Err(SatoriError::Transport(reason.into()))).is_ok())
    }

    /// Close the engine-to-client direction, as if the engine hung up.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================
