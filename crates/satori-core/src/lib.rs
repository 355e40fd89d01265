//! # satori-core
//!
//! Client-side access layer for the Satori engine.
//!
//! One connection carries two kinds of traffic at once:
//! - request/response command calls, matched by correlation id
//! - unsolicited notifications for subscribed topics
//!
//! ## Architecture
//!
//! ```text
//!  call sites ──▶ SatoriClient ──▶ PendingRegistry (id → waiter)
//!                      │                  ▲
//!                      ▼                  │ response
//!                 writer task        dispatcher task ──notification──▶ notify task
//!                      │                  ▲                               │
//!                      └──▶ Transport ────┘                    SubscriptionTable
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use satori_core::{Credentials, SatoriClient};
//! use serde_json::json;
//!
//! # async fn demo() -> satori_core::Result<()> {
//! let client = SatoriClient::new("ws://127.0.0.1:2310", Credentials::new("admin", "pw"));
//! client.connect().await?;
//!
//! client.set(json!({"key": "a", "data": {"n": 1}})).await?;
//! let value = client.get(json!({"key": "a"})).await?;
//!
//! client
//!     .subscribe("a", |data| println!("a changed: {data}"))
//!     .await?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod client;
pub mod command;
pub mod config;
mod dispatch;
pub mod envelope;
mod facade;
pub mod lifecycle;
pub mod registry;
pub mod schema;
pub mod subscriptions;
pub mod transport;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CorrelationId, Credentials, Fields, Result, SatoriError};

// =============================================================================
// RE-EXPORTS: Client
// =============================================================================

pub use client::SatoriClient;
pub use command::Command;
pub use envelope::{Incoming, Notification, RESERVED_KEYS, Response, build_request};
pub use schema::Schema;
pub use subscriptions::Callback;

// =============================================================================
// RE-EXPORTS: Configuration & Lifecycle
// =============================================================================

pub use config::{ClientConfig, EngineConfig};
pub use lifecycle::{EngineCommand, EngineLifecycle, ProcessLauncher, TokioLauncher};
pub use transport::{Connector, EnginePeer, MemoryConnector, WebSocketConnector};
