//! # Dispatch Module
//!
//! The three background tasks behind one connection:
//!
//! ```text
//!   call() ──Outbound──▶ write_loop ──▶ MessageSink ──▶ engine
//!                                                         │
//!   PendingRegistry ◀──response── read_loop ◀── MessageStream
//!                                    │
//!                               notification
//!                                    ▼
//!                              notify_loop ──▶ SubscriptionTable callbacks
//! ```
//!
//! `read_loop` never runs user code, so a slow callback delays only later
//! notifications, never response delivery. The notification queue is
//! bounded by [`NOTIFICATION_QUEUE`]; when it is full the newest
//! notification is dropped with a warning.

use crate::envelope::{Incoming, Notification};
use crate::registry::PendingRegistry;
use crate::subscriptions::SubscriptionTable;
use crate::transport::{MessageSink, MessageStream};
use crate::{Result, SatoriError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Notifications buffered between the dispatcher and the callback worker.
pub(crate) const NOTIFICATION_QUEUE: usize = 1024;

/// A frame queued for the writer, with a slot for the write outcome.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub text: String,
    pub written: oneshot::Sender<Result<()>>,
}

/// Owns the write half. Stops after the first failed write.
pub(crate) async fn write_loop<S: MessageSink>(
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(Outbound { text, written }) = outbound.recv().await {
        let result = sink.send(text).await;
        let failed = result.is_err();
        let _ = written.send(result);
        if failed {
            tracing::warn!("write failed; writer stopping");
            break;
        }
    }
    sink.close().await;
}

/// Owns the read half. Routes every frame until the stream ends, then fails
/// whatever is still pending.
pub(crate) async fn read_loop<S: MessageStream>(
    mut stream: S,
    registry: Arc<PendingRegistry>,
    notifications: mpsc::Sender<Notification>,
) {
    let reason = loop {
        match stream.recv().await {
            Some(Ok(text)) => route(&text, &registry, &notifications),
            Some(Err(e)) => break e,
            None => break SatoriError::Transport("connection closed by engine".into()),
        }
    };
    let failed = registry.fail_all(reason.clone());
    tracing::warn!(error = %reason, failed, "connection lost");
}

/// Route one frame of wire text.
pub(crate) fn route(
    text: &str,
    registry: &PendingRegistry,
    notifications: &mpsc::Sender<Notification>,
) {
    match Incoming::parse(text) {
        Ok(Incoming::Response(response)) => {
            let id = response.id().clone();
            if registry.resolve(response) {
                tracing::trace!(%id, "response delivered");
            } else {
                tracing::debug!(%id, "discarding response with no pending call");
            }
        }
        Ok(Incoming::Notification(notification)) => match notifications.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(key = %dropped.key, "notification queue full; dropping notification");
            }
            Err(TrySendError::Closed(dropped)) => {
                tracing::warn!(key = %dropped.key, "notification worker gone; dropping notification");
            }
        },
        Err(e) => tracing::warn!(error = %e, "discarding malformed frame"),
    }
}

/// Delivers notifications in arrival order. The subscription is looked up at
/// delivery time, so a topic unsubscribed while its push was queued gets
/// nothing. A panicking callback is logged and the worker keeps going.
pub(crate) async fn notify_loop(
    mut notifications: mpsc::Receiver<Notification>,
    subscriptions: Arc<SubscriptionTable>,
) {
    while let Some(Notification { key, data }) = notifications.recv().await {
        match panic::catch_unwind(AssertUnwindSafe(|| subscriptions.deliver(&key, data))) {
            Ok(true) => {}
            Ok(false) => tracing::trace!(%key, "no subscriber for notification"),
            Err(_) => tracing::warn!(%key, "notification callback panicked"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
