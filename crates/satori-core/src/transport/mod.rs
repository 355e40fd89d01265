//! # Transport Module
//!
//! The contract the client consumes from a duplex text-message channel.
//!
//! A [`Connector`] establishes the channel and splits it into a
//! [`MessageSink`] (owned by the writer task) and a [`MessageStream`]
//! (owned by the dispatcher task). Neither half is ever shared.
//!
//! ## Adapters
//!
//! - [`websocket`]: `tokio-tungstenite` client, the production transport
//! - [`memory`]: in-process channel pair, for tests and embedding

pub mod memory;
pub mod websocket;

pub use memory::{EnginePeer, MemoryConnector};
pub use websocket::WebSocketConnector;

use crate::Result;
use std::future::Future;

/// Write half of a connection.
pub trait MessageSink: Send + 'static {
    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// `SatoriError::Transport` if the frame could not be written.
    fn send(&mut self, text: String) -> impl Future<Output = Result<()>> + Send;

    /// Flush and close the write half. Errors are not reported.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Read half of a connection.
pub trait MessageStream: Send + 'static {
    /// Receive the next text frame.
    ///
    /// Returns `None` once the remote side has closed the connection cleanly,
    /// and `Some(Err(_))` on a read failure.
    fn recv(&mut self) -> impl Future<Output = Option<Result<String>>> + Send;
}

/// Establishes a connection to an engine endpoint.
pub trait Connector: Send + Sync {
    type Sink: MessageSink;
    type Stream: MessageStream;

    /// Open a connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// `SatoriError::Connection` if the endpoint is unreachable or the
    /// handshake fails.
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<(Self::Sink, Self::Stream)>> + Send;
}
