//! # Envelope Module
//!
//! Encoding of request envelopes and classification of incoming frames.
//!
//! ## Wire Shapes
//!
//! ```text
//! request:      { "id", "username", "password", "command", ...fields }
//! response:     { "id", ...result }
//! notification: { "type": "notification", "key", "data" }
//! ```
//!
//! Reserved request keys are always written by the client. A caller field
//! with a reserved name is skipped, so credentials and the correlation id
//! stay authoritative whatever the caller passes.

use crate::command::Command;
use crate::{CorrelationId, Credentials, Fields, Result, SatoriError};
use serde_json::Value;

/// Keys the client owns in every request envelope.
pub const RESERVED_KEYS: [&str; 4] = ["id", "username", "password", "command"];

/// The `type` tag marking a frame as an unsolicited notification.
pub const NOTIFICATION_TYPE: &str = "notification";

/// Returns true if `key` may not be supplied by a caller.
#[must_use]
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Convert a caller-supplied JSON value into a field map.
///
/// `null` is accepted as "no fields". Any other non-object value is rejected.
pub fn fields_from_value(value: Value) -> Result<Fields> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Fields::new()),
        other => Err(SatoriError::InvalidFields(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Build a request envelope.
///
/// Reserved keys come first; caller fields follow in their own order.
#[must_use]
pub fn build_request(
    id: &CorrelationId,
    credentials: &Credentials,
    command: Command,
    fields: &Fields,
) -> Fields {
    let mut envelope = Fields::new();
    envelope.insert("id".into(), Value::String(id.as_str().to_owned()));
    envelope.insert(
        "username".into(),
        Value::String(credentials.username.clone()),
    );
    envelope.insert(
        "password".into(),
        Value::String(credentials.password.clone()),
    );
    envelope.insert("command".into(), Value::String(command.as_str().to_owned()));

    for (key, value) in fields {
        if is_reserved(key) {
            tracing::debug!(field = %key, "ignoring caller field that shadows a reserved key");
            continue;
        }
        envelope.insert(key.clone(), value.clone());
    }
    envelope
}

/// Encode a request envelope as wire text.
pub fn encode(envelope: &Fields) -> Result<String> {
    serde_json::to_string(envelope).map_err(|e| SatoriError::Serialization(e.to_string()))
}

// =============================================================================
// INCOMING FRAMES
// =============================================================================

/// A response envelope, matched to its caller by `id`.
///
/// The full object is kept, so `id` is present alongside the result fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    id: CorrelationId,
    body: Fields,
}

impl Response {
    /// The correlation id echoed by the engine.
    #[must_use]
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Look up a result field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    /// Look up a result field the caller cannot do without.
    pub fn require(&self, field: &str) -> Result<&Value> {
        self.body.get(field).ok_or_else(|| {
            SatoriError::Protocol(format!(
                "response {} is missing field '{}'",
                self.id, field
            ))
        })
    }

    /// Borrow the whole envelope.
    #[must_use]
    pub fn body(&self) -> &Fields {
        &self.body
    }

    /// Take the whole envelope as a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

/// An unsolicited push for a subscribed topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub key: String,
    pub data: Value,
}

/// A classified incoming frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Response(Response),
    Notification(Notification),
}

impl Incoming {
    /// Classify one frame of wire text.
    ///
    /// # Errors
    ///
    /// `SatoriError::Protocol` if the text is not a JSON object, a
    /// notification has no string `key`, or a response has no usable `id`.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SatoriError::Protocol(format!("frame is not valid JSON: {}", e)))?;

        let mut body = match value {
            Value::Object(body) => body,
            other => {
                return Err(SatoriError::Protocol(format!(
                    "frame is a JSON {}, expected an object",
                    json_kind(&other)
                )));
            }
        };

        if body.get("type").and_then(Value::as_str) == Some(NOTIFICATION_TYPE) {
            let key = match body.remove("key") {
                Some(Value::String(key)) => key,
                _ => {
                    return Err(SatoriError::Protocol(
                        "notification without a string 'key'".into(),
                    ));
                }
            };
            let data = body.remove("data").unwrap_or(Value::Null);
            return Ok(Self::Notification(Notification { key, data }));
        }

        // Numeric ids are tolerated so a peer that re-encodes the token as a
        // number still matches.
        let id = match body.get("id") {
            Some(Value::String(id)) => CorrelationId::new(id.clone()),
            Some(Value::Number(n)) => CorrelationId::new(n.to_string()),
            Some(other) => {
                return Err(SatoriError::Protocol(format!(
                    "response id is a JSON {}",
                    json_kind(other)
                )));
            }
            None => return Err(SatoriError::Protocol("response without an 'id'".into())),
        };
        Ok(Self::Response(Response { id, body }))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// TESTS
// =============================================================================
