//! # Pending-Call Registry
//!
//! Maps correlation ids to the callers waiting on them.
//!
//! ## Invariants
//!
//! - At most one waiter per correlation id. A colliding registration is
//!   rejected and the caller must pick another id.
//! - An entry leaves the registry exactly once: when its response is routed,
//!   when the call fails or times out, or when the waiting future is dropped.
//! - Once the connection fails the registry is closed. Every waiter receives
//!   the failure and later registrations are refused with the same error.

use crate::envelope::Response;
use crate::{CorrelationId, Result, SatoriError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// How many fresh ids a caller tries before giving up on a registration.
pub const MAX_ID_ATTEMPTS: usize = 8;

type Waiter = oneshot::Sender<Result<Response>>;

// =============================================================================
// ID GENERATION
// =============================================================================

/// Produces correlation ids of the form `<session>-<sequence>`.
///
/// The session token is random per generator so ids from different clients
/// sharing an engine do not overlap; the sequence is monotonic.
#[derive(Debug)]
pub struct IdGenerator {
    session: String,
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a generator with a random session token.
    #[must_use]
    pub fn new() -> Self {
        Self::with_session(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Create a generator with a fixed session token.
    #[must_use]
    pub fn with_session(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            next: AtomicU64::new(1),
        }
    }

    /// Produce the next id.
    pub fn next_id(&self) -> CorrelationId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        CorrelationId::new(format!("{}-{}", self.session, seq))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Default)]
struct RegistryState {
    waiters: HashMap<CorrelationId, Waiter>,
    closed: Option<SatoriError>,
}

/// The set of calls awaiting a response on one connection.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    state: Mutex<RegistryState>,
}

impl PendingRegistry {
    /// Create an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `id`.
    ///
    /// Returns `Ok(None)` if `id` is already pending.
    ///
    /// # Errors
    ///
    /// The stored failure if the registry has been closed.
    pub fn try_register(
        &self,
        id: CorrelationId,
    ) -> Result<Option<oneshot::Receiver<Result<Response>>>> {
        let mut state = self.lock();
        if let Some(err) = &state.closed {
            return Err(err.clone());
        }
        if state.waiters.contains_key(&id) {
            tracing::warn!(%id, "correlation id collision; caller must reassign");
            return Ok(None);
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(id, tx);
        tracing::trace!(pending = state.waiters.len(), "registered pending waiter");
        Ok(Some(rx))
    }

    /// Route a response to its waiter.
    ///
    /// Returns `false` if no call is pending under the response's id.
    pub fn resolve(&self, response: Response) -> bool {
        let waiter = self.lock().waiters.remove(response.id());
        match waiter {
            Some(tx) => {
                // The caller may have just given up; nothing to do then.
                let _ = tx.send(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Drop the entry for `id` without delivering anything.
    pub fn remove(&self, id: &CorrelationId) -> bool {
        self.lock().waiters.remove(id).is_some()
    }

    /// Fail every pending call with `err` and refuse new registrations.
    ///
    /// Returns how many calls were failed. Closing twice keeps the first error.
    pub fn fail_all(&self, err: SatoriError) -> usize {
        let drained: Vec<Waiter> = {
            let mut state = self.lock();
            if state.closed.is_none() {
                state.closed = Some(err.clone());
            }
            state.waiters.drain().map(|(_, tx)| tx).collect()
        };
        let count = drained.len();
        for tx in drained {
            let _ = tx.send(Err(err.clone()));
        }
        count
    }

    /// Whether `id` is currently pending.
    #[must_use]
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.lock().waiters.contains_key(id)
    }

    /// Number of pending calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Whether no call is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The failure that closed this registry, if any.
    #[must_use]
    pub fn closed(&self) -> Option<SatoriError> {
        self.lock().closed.clone()
    }
}

// =============================================================================
// PENDING CALL GUARD
// =============================================================================

/// A registered call. Dropping it removes the registry entry.
#[derive(Debug)]
pub struct PendingCall {
    id: CorrelationId,
    rx: Option<oneshot::Receiver<Result<Response>>>,
    registry: Arc<PendingRegistry>,
}

impl PendingCall {
    /// Register under a fresh id from `ids`, reassigning on collision.
    pub fn register(registry: &Arc<PendingRegistry>, ids: &IdGenerator) -> Result<Self> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = ids.next_id();
            if let Some(rx) = registry.try_register(id.clone())? {
                return Ok(Self {
                    id,
                    rx: Some(rx),
                    registry: Arc::clone(registry),
                });
            }
        }
        Err(SatoriError::Protocol(format!(
            "could not allocate a unique correlation id in {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// The id this call was registered under.
    #[must_use]
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Wait for the response routed to this call.
    pub async fn wait(mut self) -> Result<Response> {
        let Some(rx) = self.rx.take() else {
            return Err(SatoriError::Transport("pending call already awaited".into()));
        };
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(self.registry.closed().unwrap_or_else(|| {
                SatoriError::Transport("dispatcher stopped before responding".into())
            })),
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}

// =============================================================================
// TESTS
// =============================================================================
