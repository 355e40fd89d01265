//! # Schema Module
//!
//! A reusable `(schema, key, body)` triple that replays itself into the
//! facade, so an entity's fields are written once.
//!
//! ```no_run
//! # async fn demo(client: satori_core::SatoriClient) -> satori_core::Result<()> {
//! use serde_json::json;
//!
//! let user = client
//!     .schema("users")
//!     .with_key("alice")
//!     .with_body(json!({"name": "Alice"}));
//! user.set().await?;
//! user.set_vertex().await?;
//! let stored = user.get_vertex().await?;
//! # let _ = stored;
//! # Ok(())
//! # }
//! ```

use crate::envelope::Response;
use crate::{Result, SatoriClient};
use serde_json::{Value, json};

/// An entity addressed by schema name and key, with an optional body.
///
/// Unset key and body are sent as `null`.
#[derive(Debug, Clone)]
pub struct Schema {
    client: SatoriClient,
    name: String,
    key: Value,
    body: Value,
}

impl SatoriClient {
    /// Start a [`Schema`] builder for `name` on this client.
    #[must_use]
    pub fn schema(&self, name: impl Into<String>) -> Schema {
        Schema::new(self.clone(), name)
    }
}

impl Schema {
    /// Create a builder with no key and no body.
    #[must_use]
    pub fn new(client: SatoriClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            key: Value::Null,
            body: Value::Null,
        }
    }

    /// Set the key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Value>) -> Self {
        self.key = key.into();
        self
    }

    /// Set the body sent as `data`.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn key(&self) -> &Value {
        &self.key
    }

    #[must_use]
    pub fn body(&self) -> &Value {
        &self.body
    }

    fn addressed(&self) -> Value {
        json!({ "schema": &self.name, "key": &self.key })
    }

    fn with_data(&self) -> Value {
        json!({ "schema": &self.name, "key": &self.key, "data": &self.body })
    }

    pub async fn set(&self) -> Result<Response> {
        self.client.set(self.with_data()).await
    }

    pub async fn delete(&self) -> Result<Response> {
        self.client.delete(self.addressed()).await
    }

    pub async fn encrypt(&self) -> Result<Response> {
        self.client.encrypt(self.with_data()).await
    }

    pub async fn decrypt(&self) -> Result<Response> {
        self.client.decrypt(self.with_data()).await
    }

    pub async fn set_vertex(&self) -> Result<Response> {
        self.client.set_vertex(self.with_data()).await
    }

    pub async fn get_vertex(&self) -> Result<Response> {
        self.client.get_vertex(self.addressed()).await
    }

    pub async fn delete_vertex(&self) -> Result<Response> {
        self.client.delete_vertex(self.addressed()).await
    }

    pub async fn dfs(&self) -> Result<Response> {
        self.client.dfs(self.with_data()).await
    }

    pub async fn set_ref(&self) -> Result<Response> {
        self.client.set_ref(self.with_data()).await
    }

    pub async fn get_refs(&self) -> Result<Response> {
        self.client.get_refs(self.addressed()).await
    }

    pub async fn delete_refs(&self) -> Result<Response> {
        self.client.delete_refs(self.addressed()).await
    }

    pub async fn push(&self) -> Result<Response> {
        self.client.push(self.with_data()).await
    }

    pub async fn pop(&self) -> Result<Response> {
        self.client.pop(self.addressed()).await
    }

    pub async fn splice(&self) -> Result<Response> {
        self.client.splice(self.with_data()).await
    }

    pub async fn remove(&self) -> Result<Response> {
        self.client.remove(self.with_data()).await
    }
}

// =============================================================================
// TESTS
// =============================================================================
