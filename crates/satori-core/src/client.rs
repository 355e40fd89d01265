//! # Client Module
//!
//! [`SatoriClient`] is the correlation & dispatch engine.
//!
//! ## Call Path
//!
//! 1. Allocate a correlation id and register it as pending
//! 2. Build the envelope (reserved keys are authoritative)
//! 3. Queue it for the writer task and wait for the write outcome
//! 4. Suspend until the dispatcher routes the matching response
//!
//! An optional deadline covers steps 3 and 4 together.
//!
//! Any number of calls may be outstanding at once. Responses are matched by
//! id, never by arrival order.
//!
//! ## Failure Policy
//!
//! A read or write failure is fatal to the connection: every pending call
//! fails with `SatoriError::Transport` and later calls fail fast until
//! `connect` is called again. There is no automatic reconnection.

use crate::command::Command;
use crate::config::ClientConfig;
use crate::dispatch::{self, Outbound};
use crate::envelope::{Response, build_request, encode, fields_from_value};
use crate::registry::{IdGenerator, PendingCall, PendingRegistry};
use crate::subscriptions::{Callback, SubscriptionTable};
use crate::transport::{Connector, WebSocketConnector};
use crate::{Credentials, Result, SatoriError};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

// =============================================================================
// CONNECTION HANDLE
// =============================================================================

/// One established connection and the tasks serving it.
///
/// Dropping the handle stops the tasks and fails every pending call.
#[derive(Debug)]
struct Connection {
    registry: Arc<PendingRegistry>,
    outbound: mpsc::UnboundedSender<Outbound>,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    /// Hand `text` to the writer and wait until it is on the wire.
    ///
    /// A failed write poisons the connection for every pending call.
    async fn write(&self, text: String) -> Result<()> {
        let (written, outcome) = oneshot::channel();
        let result = match self.outbound.send(Outbound { text, written }) {
            Ok(()) => outcome
                .await
                .unwrap_or_else(|_| Err(SatoriError::Transport("writer stopped".into()))),
            Err(_) => Err(self
                .registry
                .closed()
                .unwrap_or_else(|| SatoriError::Transport("writer stopped".into()))),
        };
        if let Err(e) = &result {
            self.registry.fail_all(e.clone());
        }
        result
    }

    fn is_open(&self) -> bool {
        self.registry.closed().is_none()
    }

    fn shutdown(&self, reason: &str) {
        for task in &self.tasks {
            task.abort();
        }
        let failed = self
            .registry
            .fail_all(SatoriError::Transport(reason.to_owned()));
        if failed > 0 {
            tracing::debug!(failed, reason, "failed pending calls on shutdown");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown("connection closed");
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug)]
struct ClientInner {
    endpoint: String,
    credentials: Credentials,
    request_timeout: Option<Duration>,
    ids: IdGenerator,
    subscriptions: Arc<SubscriptionTable>,
    connection: Mutex<Option<Arc<Connection>>>,
}

/// Client for one Satori engine endpoint.
///
/// Cloning is cheap; clones share the connection, the pending calls and the
/// subscriptions. Separate `SatoriClient::new` instances share nothing.
#[derive(Debug, Clone)]
pub struct SatoriClient {
    inner: Arc<ClientInner>,
}

impl SatoriClient {
    /// Create a client for `endpoint` (e.g. `ws://127.0.0.1:2310`).
    ///
    /// Nothing is opened until [`connect`](Self::connect).
    #[must_use]
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self::build(endpoint.into(), credentials, None)
    }

    /// Create a client from loaded configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::build(
            config.host.clone(),
            config.credentials(),
            config.request_timeout(),
        )
    }

    fn build(endpoint: String, credentials: Credentials, request_timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                endpoint,
                credentials,
                request_timeout,
                ids: IdGenerator::new(),
                subscriptions: Arc::new(SubscriptionTable::new()),
                connection: Mutex::new(None),
            }),
        }
    }

    /// Return a client with a default deadline for every call.
    ///
    /// Must be called before the client is cloned or connected; on a shared
    /// client the setting is ignored.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.request_timeout = Some(timeout);
        } else {
            tracing::warn!("with_request_timeout on a shared client has no effect");
        }
        self
    }

    /// The endpoint this client connects to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// The default per-call deadline, if any.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.inner.request_timeout
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<Connection>>> {
        self.inner
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn connection(&self) -> Result<Arc<Connection>> {
        self.slot().clone().ok_or(SatoriError::NotConnected)
    }

    // =========================================================================
    // CONNECTION LIFECYCLE
    // =========================================================================

    /// Open a WebSocket connection to the configured endpoint.
    pub async fn connect(&self) -> Result<()> {
        self.connect_with(&WebSocketConnector).await
    }

    /// Open a connection through `connector`.
    ///
    /// A previously open connection is replaced; its pending calls fail.
    pub async fn connect_with<C: Connector>(&self, connector: &C) -> Result<()> {
        let (sink, stream) = connector.connect(&self.inner.endpoint).await?;

        let registry = Arc::new(PendingRegistry::new());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::channel(dispatch::NOTIFICATION_QUEUE);
        let tasks = vec![
            tokio::spawn(dispatch::write_loop(sink, outbound_rx)),
            tokio::spawn(dispatch::read_loop(stream, Arc::clone(&registry), notify_tx)),
            tokio::spawn(dispatch::notify_loop(
                notify_rx,
                Arc::clone(&self.inner.subscriptions),
            )),
        ];
        let connection = Arc::new(Connection {
            registry,
            outbound: outbound_tx,
            tasks,
        });

        let previous = self.slot().replace(connection);
        if let Some(old) = previous {
            old.shutdown("connection replaced");
        }
        tracing::info!(endpoint = %self.inner.endpoint, "connected to Satori engine");
        Ok(())
    }

    /// Close the connection. Pending calls fail with `SatoriError::Transport`.
    pub fn close(&self) {
        let previous = self.slot().take();
        if let Some(connection) = previous {
            connection.shutdown("connection closed");
            tracing::info!(endpoint = %self.inner.endpoint, "disconnected");
        }
    }

    /// Whether a connection is open and has not failed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.slot().as_ref().is_some_and(|c| c.is_open())
    }

    /// Number of calls currently awaiting a response.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.slot().as_ref().map_or(0, |c| c.registry.len())
    }

    /// Whether a callback is registered for `key`.
    #[must_use]
    pub fn is_subscribed(&self, key: &str) -> bool {
        self.inner.subscriptions.contains(key)
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// Send `command` with `fields` and wait for its response.
    ///
    /// `fields` must be a JSON object or `null`. Keys `id`, `username`,
    /// `password` and `command` in `fields` are ignored.
    ///
    /// Uses the client's default deadline, if one is configured.
    pub async fn call(&self, command: Command, fields: Value) -> Result<Response> {
        self.send_command(command, fields, self.inner.request_timeout)
            .await
    }

    /// Like [`call`](Self::call) with an explicit deadline.
    ///
    /// On expiry the call fails with `SatoriError::Timeout`; the connection
    /// and other pending calls are unaffected.
    pub async fn call_with_timeout(
        &self,
        command: Command,
        fields: Value,
        timeout: Duration,
    ) -> Result<Response> {
        self.send_command(command, fields, Some(timeout)).await
    }

    async fn send_command(
        &self,
        command: Command,
        fields: Value,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let fields = fields_from_value(fields)?;
        let connection = self.connection()?;

        let pending = PendingCall::register(&connection.registry, &self.inner.ids)?;
        let envelope = build_request(pending.id(), &self.inner.credentials, command, &fields);
        let text = encode(&envelope)?;

        let id = pending.id().clone();
        tracing::debug!(%id, %command, "sending command");

        // The deadline covers the write too; a stalled write leaves the
        // connection open.
        let round_trip = async {
            connection.write(text).await?;
            pending.wait().await
        };
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, round_trip).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(%id, %command, ?limit, "command timed out");
                    Err(SatoriError::Timeout(limit))
                }
            },
            None => round_trip.await,
        }
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Register `callback` for notifications on `key`, then ask the engine to
    /// start pushing them.
    ///
    /// The callback is installed before NOTIFY is sent, so a push that
    /// arrives right after the engine's acknowledgement is never missed.
    /// Re-subscribing a key replaces its callback. If NOTIFY fails the
    /// previous state of the key is restored.
    pub async fn subscribe<F>(&self, key: impl Into<String>, callback: F) -> Result<()>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let key = key.into();
        let callback: Callback = Arc::new(callback);
        let previous = self
            .inner
            .subscriptions
            .insert(key.clone(), Arc::clone(&callback));

        match self.call(Command::Notify, json!({ "key": &key })).await {
            Ok(_) => {
                tracing::debug!(%key, "subscribed");
                Ok(())
            }
            Err(e) => {
                self.inner.subscriptions.restore(&key, &callback, previous);
                Err(e)
            }
        }
    }

    /// Drop the callback for `key`, then ask the engine to stop pushing it.
    ///
    /// Notifications for `key` that arrive after this returns, or while
    /// UNNOTIFY is in flight, are discarded.
    pub async fn unsubscribe(&self, key: &str) -> Result<()> {
        self.inner.subscriptions.remove(key);
        self.call(Command::Unnotify, json!({ "key": key })).await?;
        tracing::debug!(%key, "unsubscribed");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
