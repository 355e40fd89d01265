//! # Core Type Definitions
//!
//! This module contains the shared types of the Satori client:
//! - Correlation identifiers (`CorrelationId`)
//! - Credentials sent with every request (`Credentials`)
//! - Caller field maps (`Fields`)
//! - Error types (`SatoriError`)
//!
//! Envelope encoding and decoding lives in [`crate::envelope`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Command-specific fields merged at the top level of a request envelope.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SatoriError>;

// =============================================================================
// CORRELATION IDENTIFIERS
// =============================================================================

/// Opaque token placed on a request and echoed on its response.
///
/// Tokens are produced by [`crate::registry::IdGenerator`] and are unique
/// among the pending calls of one client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Username and password attached to every request.
///
/// Both default to the empty string, which the engine treats as anonymous.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Create credentials from a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Satori client.
///
/// Transport failures are fatal to every call pending on the connection.
/// Unmatched responses and unknown notification topics are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SatoriError {
    /// A command was issued before `connect`.
    #[error("Not connected: call connect() before issuing commands")]
    NotConnected,

    /// The transport could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Send or receive failed on an established connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A malformed or field-incomplete envelope was received.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No response arrived within the call's deadline.
    #[error("Timed out after {0:?} waiting for response")]
    Timeout(Duration),

    /// Caller-supplied fields were not a JSON object.
    #[error("Invalid fields: {0}")]
    InvalidFields(String),

    /// A request envelope could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The local engine process could not be launched or stopped.
    #[error("Engine lifecycle error: {0}")]
    Lifecycle(String),
}

// =============================================================================
// TESTS
// =============================================================================
