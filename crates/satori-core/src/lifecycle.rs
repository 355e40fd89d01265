//! # Engine Lifecycle
//!
//! Launching and stopping a local engine process. Kept apart from the
//! protocol client: nothing here knows about envelopes or connections.
//!
//! The launch capability is the [`ProcessLauncher`] trait, so tests and
//! supervisors can substitute their own. [`TokioLauncher`] spawns a real
//! child process.

use crate::{Result, SatoriError};
use std::future::Future;

/// Binary and arguments of an engine process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub binary: String,
    pub args: Vec<String>,
}

impl EngineCommand {
    #[must_use]
    pub fn new(binary: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }
}

/// A running engine process.
pub trait EngineProcess: Send {
    /// OS process id, if the platform reports one.
    fn id(&self) -> Option<u32>;

    /// Whether the process has already exited.
    fn has_exited(&mut self) -> Result<bool>;

    /// Terminate the process and reap it.
    fn terminate(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Capability to start engine processes.
pub trait ProcessLauncher: Send + Sync {
    type Process: EngineProcess;

    fn launch(&self, command: &EngineCommand) -> Result<Self::Process>;
}

// =============================================================================
// TOKIO LAUNCHER
// =============================================================================

/// Launches engines with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

/// A child process started by [`TokioLauncher`]. Killed if dropped.
#[derive(Debug)]
pub struct TokioProcess {
    child: tokio::process::Child,
}

impl ProcessLauncher for TokioLauncher {
    type Process = TokioProcess;

    fn launch(&self, command: &EngineCommand) -> Result<TokioProcess> {
        let child = tokio::process::Command::new(&command.binary)
            .args(&command.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SatoriError::Lifecycle(format!("cannot launch '{}': {}", command.binary, e))
            })?;
        Ok(TokioProcess { child })
    }
}

impl EngineProcess for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn has_exited(&mut self) -> Result<bool> {
        self.child
            .try_wait()
            .map(|status| status.is_some())
            .map_err(|e| SatoriError::Lifecycle(e.to_string()))
    }

    async fn terminate(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .map_err(|e| SatoriError::Lifecycle(format!("cannot stop engine: {}", e)))
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Tracks at most one engine process started from a fixed command.
#[derive(Debug)]
pub struct EngineLifecycle<L: ProcessLauncher = TokioLauncher> {
    launcher: L,
    command: EngineCommand,
    process: Option<L::Process>,
}

impl EngineLifecycle<TokioLauncher> {
    /// Lifecycle backed by real child processes.
    #[must_use]
    pub fn local(command: EngineCommand) -> Self {
        Self::new(TokioLauncher, command)
    }
}

impl<L: ProcessLauncher> EngineLifecycle<L> {
    #[must_use]
    pub fn new(launcher: L, command: EngineCommand) -> Self {
        Self {
            launcher,
            command,
            process: None,
        }
    }

    #[must_use]
    pub fn command(&self) -> &EngineCommand {
        &self.command
    }

    /// Launch the engine. Returns its process id when known.
    ///
    /// # Errors
    ///
    /// `SatoriError::Lifecycle` if an engine started here is still running or
    /// the launch fails.
    pub fn start(&mut self) -> Result<Option<u32>> {
        if self.is_running() {
            return Err(SatoriError::Lifecycle("engine is already running".into()));
        }
        let process = self.launcher.launch(&self.command)?;
        let pid = process.id();
        tracing::info!(binary = %self.command.binary, ?pid, "engine started");
        self.process = Some(process);
        Ok(pid)
    }

    /// Whether the engine started here is still alive.
    ///
    /// A process that has exited on its own is forgotten.
    pub fn is_running(&mut self) -> bool {
        let Some(process) = self.process.as_mut() else {
            return false;
        };
        match process.has_exited() {
            Ok(false) => true,
            Ok(true) => {
                tracing::info!(binary = %self.command.binary, "engine exited");
                self.process = None;
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot query engine status");
                true
            }
        }
    }

    /// Stop the engine. A no-op if none is running.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        if process.has_exited()? {
            return Ok(());
        }
        process.terminate().await?;
        tracing::info!(binary = %self.command.binary, "engine stopped");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
