//! WebSocket transport over `tokio-tungstenite`.

use super::{Connector, MessageSink, MessageStream};
use crate::{Result, SatoriError};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to `ws://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

/// Write half of a WebSocket connection.
pub struct WebSocketSink {
    inner: SplitSink<Socket, Message>,
}

/// Read half of a WebSocket connection.
pub struct WebSocketStreamHalf {
    inner: SplitStream<Socket>,
}

impl Connector for WebSocketConnector {
    type Sink = WebSocketSink;
    type Stream = WebSocketStreamHalf;

    async fn connect(&self, endpoint: &str) -> Result<(Self::Sink, Self::Stream)> {
        let (socket, _response) = connect_async(endpoint)
            .await
            .map_err(|e| SatoriError::Connection(format!("{}: {}", endpoint, e)))?;
        let (write, read) = socket.split();
        Ok((
            WebSocketSink { inner: write },
            WebSocketStreamHalf { inner: read },
        ))
    }
}

impl MessageSink for WebSocketSink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SatoriError::Transport(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

impl MessageStream for WebSocketStreamHalf {
    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        tracing::warn!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                    }
                },
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "engine closed the websocket");
                    return None;
                }
                // Pings are answered by tungstenite on the next write.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(SatoriError::Transport(e.to_string()))),
            }
        }
    }
}
