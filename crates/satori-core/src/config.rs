//! # Configuration
//!
//! Client settings, layered lowest to highest:
//!
//! 1. Built-in defaults
//! 2. A TOML file ([`ClientConfig::load`])
//! 3. Environment variables ([`ClientConfig::apply_env`])
//!
//! ## Environment Variables
//!
//! - `SATORI_HOST`: engine endpoint, e.g. `ws://127.0.0.1:2310`
//! - `SATORI_USERNAME` / `SATORI_PASSWORD`: credentials
//! - `SATORI_TIMEOUT_MS`: default per-call deadline, `0` disables it
//!
//! ## File Format
//!
//! ```toml
//! host = "ws://127.0.0.1:2310"
//! username = "admin"
//! password = "secret"
//! request_timeout_ms = 30000
//!
//! [engine]
//! binary = "/usr/local/bin/satori"
//! args = ["--port", "2310"]
//! ```

use crate::lifecycle::EngineCommand;
use crate::{Credentials, Result, SatoriError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Endpoint used when nothing else is configured.
pub const DEFAULT_HOST: &str = "ws://127.0.0.1:2310";

/// Engine binary launched when `[engine]` does not name one.
pub const DEFAULT_ENGINE_BINARY: &str = "satori";

pub const ENV_HOST: &str = "SATORI_HOST";
pub const ENV_USERNAME: &str = "SATORI_USERNAME";
pub const ENV_PASSWORD: &str = "SATORI_PASSWORD";
pub const ENV_TIMEOUT_MS: &str = "SATORI_TIMEOUT_MS";

/// Settings for a [`SatoriClient`](crate::SatoriClient).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    /// Default per-call deadline. `None` waits forever.
    pub request_timeout_ms: Option<u64>,
    /// Local engine process, for `EngineLifecycle`.
    pub engine: Option<EngineConfig>,
}

/// How to launch a local engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub binary: String,
    pub args: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            username: String::new(),
            password: String::new(),
            request_timeout_ms: None,
            engine: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_ENGINE_BINARY.to_string(),
            args: Vec::new(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("engine", &self.engine)
            .finish()
    }
}

impl ClientConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SatoriError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SatoriError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
            .map_err(|e| SatoriError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `SATORI_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup`, keyed by the `SATORI_*` variable names.
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(host) = get(ENV_HOST) {
            self.host = host;
        }
        if let Some(username) = get(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(password) = get(ENV_PASSWORD) {
            self.password = password;
        }
        if let Some(raw) = get(ENV_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                SatoriError::Config(format!("{} must be an integer, got '{}'", ENV_TIMEOUT_MS, raw))
            })?;
            self.request_timeout_ms = Some(ms);
        }
        Ok(())
    }

    /// The credentials to send with every request.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// The default per-call deadline. `0` means none.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// The engine launch command, falling back to [`DEFAULT_ENGINE_BINARY`].
    #[must_use]
    pub fn engine_command(&self) -> EngineCommand {
        let engine = self.engine.clone().unwrap_or_default();
        EngineCommand::new(engine.binary, engine.args)
    }
}

// =============================================================================
// TESTS
// =============================================================================
