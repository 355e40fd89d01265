//! # Satori CLI Module
//!
//! ## Available Commands
//!
//! - `call` - Send any engine command with JSON fields
//! - `get` / `set` / `delete` - Store shortcuts
//! - `operations` - List the operations the engine supports
//! - `listen` - Print notifications for a key until Ctrl-C
//! - `engine` - Run a local engine process until Ctrl-C
//!
//! Connection settings come from `--config`, then `SATORI_*` environment
//! variables, then the global flags below.

mod commands;

use clap::{Parser, Subcommand};
use satori_core::{ClientConfig, SatoriError};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Satori - command-line client for the Satori engine
#[derive(Parser, Debug)]
#[command(name = "satori")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Engine endpoint, e.g. ws://127.0.0.1:2310
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,

    /// Username sent with every request
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// Password sent with every request
    #[arg(short, long, global = true)]
    pub password: Option<String>,

    /// Per-call deadline in milliseconds (0 disables it)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send an arbitrary command
    Call {
        /// Command tag, e.g. GET or graph-bfs
        command: String,

        /// Command fields as a JSON object
        #[arg(short, long)]
        fields: Option<String>,
    },

    /// Read a value
    Get {
        #[arg(short, long)]
        key: String,

        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Store a value
    Set {
        #[arg(short, long)]
        key: String,

        /// Value to store; JSON, or taken as a plain string
        #[arg(short, long)]
        data: String,

        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Delete a value
    Delete {
        #[arg(short, long)]
        key: String,

        #[arg(short, long)]
        schema: Option<String>,
    },

    /// List the operations the engine supports
    Operations,

    /// Print notifications for a key until Ctrl-C
    Listen {
        /// Key to subscribe to
        key: String,
    },

    /// Launch a local engine and stop it on Ctrl-C
    Engine {
        /// Engine binary (overrides [engine].binary)
        #[arg(short, long)]
        binary: Option<String>,

        /// Arguments passed to the engine
        #[arg(last = true)]
        args: Vec<String>,
    },
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Resolve client settings: file, then process environment, then flags.
pub fn resolve_config(cli: &Cli) -> Result<ClientConfig, SatoriError> {
    resolve_config_with(cli, |name| std::env::var(name).ok())
}

/// Like [`resolve_config`] with an explicit environment lookup.
pub fn resolve_config_with<F>(cli: &Cli, env: F) -> Result<ClientConfig, SatoriError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    config.apply_overrides(env)?;

    if let Some(host) = &cli.host {
        config.host.clone_from(host);
    }
    if let Some(username) = &cli.username {
        config.username.clone_from(username);
    }
    if let Some(password) = &cli.password {
        config.password.clone_from(password);
    }
    if let Some(ms) = cli.timeout_ms {
        config.request_timeout_ms = Some(ms);
    }
    Ok(config)
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), SatoriError> {
    let config = resolve_config(&cli)?;
    tracing::debug!(?config, "resolved configuration");

    match cli.command {
        Commands::Call { command, fields } => cmd_call(&config, &command, fields.as_deref()).await,
        Commands::Get { key, schema } => cmd_get(&config, &key, schema.as_deref()).await,
        Commands::Set { key, data, schema } => {
            cmd_set(&config, &key, &data, schema.as_deref()).await
        }
        Commands::Delete { key, schema } => cmd_delete(&config, &key, schema.as_deref()).await,
        Commands::Operations => cmd_operations(&config).await,
        Commands::Listen { key } => cmd_listen(&config, &key).await,
        Commands::Engine { binary, args } => cmd_engine(&config, binary, args).await,
    }
}
