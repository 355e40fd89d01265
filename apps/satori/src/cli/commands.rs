//! # CLI Command Implementations

use satori_core::{
    ClientConfig, Command, EngineLifecycle, Response, SatoriClient, SatoriError,
};
use serde_json::{Map, Value};
use std::time::Duration;

/// How often `listen` checks that the connection is still up.
const LIVENESS_POLL: Duration = Duration::from_millis(250);

// =============================================================================
// ARGUMENT PARSING
// =============================================================================

/// Parse a command tag such as `GET` or `graph-bfs`.
pub fn parse_command(tag: &str) -> Result<Command, SatoriError> {
    tag.parse()
}

/// Parse `--fields`. Absent means no fields.
pub fn parse_fields(raw: Option<&str>) -> Result<Value, SatoriError> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| SatoriError::InvalidFields(format!("--fields is not valid JSON: {}", e)))?;
    match value {
        Value::Object(_) | Value::Null => Ok(value),
        _ => Err(SatoriError::InvalidFields(
            "--fields must be a JSON object".to_string(),
        )),
    }
}

/// Parse `--data`: JSON if it parses, otherwise the raw string.
pub fn parse_data(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Fields for the store shortcuts.
pub fn store_fields(key: &str, schema: Option<&str>, data: Option<Value>) -> Value {
    let mut fields = Map::new();
    if let Some(schema) = schema {
        fields.insert("schema".to_string(), Value::from(schema));
    }
    fields.insert("key".to_string(), Value::from(key));
    if let Some(data) = data {
        fields.insert("data".to_string(), data);
    }
    Value::Object(fields)
}

/// Pretty JSON for terminal output.
pub fn render(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn open_client(config: &ClientConfig) -> Result<SatoriClient, SatoriError> {
    let client = SatoriClient::from_config(config);
    client.connect().await?;
    Ok(client)
}

/// Run one request on a fresh connection and print the response.
async fn run_once(config: &ClientConfig, command: Command, fields: Value) -> Result<(), SatoriError> {
    let client = open_client(config).await?;
    let outcome = client.call(command, fields).await;
    client.close();
    print_response(outcome?);
    Ok(())
}

fn print_response(response: Response) {
    println!("{}", render(&response.into_value()));
}

// =============================================================================
// REQUEST COMMANDS
// =============================================================================

/// Send an arbitrary command.
pub async fn cmd_call(
    config: &ClientConfig,
    command: &str,
    fields: Option<&str>,
) -> Result<(), SatoriError> {
    let command = parse_command(command)?;
    let fields = parse_fields(fields)?;
    run_once(config, command, fields).await
}

pub async fn cmd_get(
    config: &ClientConfig,
    key: &str,
    schema: Option<&str>,
) -> Result<(), SatoriError> {
    run_once(config, Command::Get, store_fields(key, schema, None)).await
}

pub async fn cmd_set(
    config: &ClientConfig,
    key: &str,
    data: &str,
    schema: Option<&str>,
) -> Result<(), SatoriError> {
    let fields = store_fields(key, schema, Some(parse_data(data)));
    run_once(config, Command::Set, fields).await
}

pub async fn cmd_delete(
    config: &ClientConfig,
    key: &str,
    schema: Option<&str>,
) -> Result<(), SatoriError> {
    run_once(config, Command::Delete, store_fields(key, schema, None)).await
}

pub async fn cmd_operations(config: &ClientConfig) -> Result<(), SatoriError> {
    run_once(config, Command::GetOperations, Value::Null).await
}

// =============================================================================
// LISTEN COMMAND
// =============================================================================

/// Print notifications for `key` until Ctrl-C or the connection drops.
pub async fn cmd_listen(config: &ClientConfig, key: &str) -> Result<(), SatoriError> {
    let client = open_client(config).await?;
    client
        .subscribe(key, |data| println!("{}", render(&data)))
        .await?;
    tracing::info!(%key, host = %config.host, "listening for notifications; Ctrl-C to stop");

    let lost = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "cannot wait for Ctrl-C");
            }
            false
        }
        () = connection_lost(&client) => true,
    };

    let outcome = if lost {
        Err(SatoriError::Transport("connection to engine lost".to_string()))
    } else {
        client.unsubscribe(key).await
    };
    client.close();
    outcome
}

async fn connection_lost(client: &SatoriClient) {
    while client.is_connected() {
        tokio::time::sleep(LIVENESS_POLL).await;
    }
}

// =============================================================================
// ENGINE COMMAND
// =============================================================================

/// Run a local engine until Ctrl-C.
pub async fn cmd_engine(
    config: &ClientConfig,
    binary: Option<String>,
    args: Vec<String>,
) -> Result<(), SatoriError> {
    let mut command = config.engine_command();
    if let Some(binary) = binary {
        command.binary = binary;
    }
    if !args.is_empty() {
        command.args = args;
    }

    let mut engine = EngineLifecycle::local(command);
    let pid = engine.start()?;
    println!(
        "Engine '{}' running (pid {}). Press Ctrl-C to stop.",
        engine.command().binary,
        pid.map_or_else(|| "unknown".to_string(), |p| p.to_string())
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot wait for Ctrl-C");
    }
    engine.stop().await
}

// =============================================================================
// TESTS
// =============================================================================
