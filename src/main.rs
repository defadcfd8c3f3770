//! Command-line runner for the launch/buy engine
//!
//! Reads one JSON request (`{"launch": {...}}` or `{"buy": {...}}`) from the
//! file given as the first argument, or from stdin, executes it with the
//! service selected by `BONK_MODE`, and prints `{"status": ..., "body": ...}`.

use anyhow::{Context, Result};
use bonk_launcher::{EngineConfig, Intent, LaunchpadBuilder, OperationResult, Request};
use std::io::Read;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout carries the result
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::from_env()?;
    info!(mode = ?config.mode, endpoints = config.rpc_endpoints.len(), "Starting bonk-launcher");
    let service = LaunchpadBuilder::from_config(config).build()?;

    let raw = read_request(std::env::args().nth(1))?;
    let request: Request = serde_json::from_str(&raw)
        .context("request must be a JSON object with a single \"launch\" or \"buy\" field")?;

    let result = match Intent::try_from(request) {
        Ok(intent) => service.execute(intent).await,
        Err(err) => OperationResult::from_error(&err),
    };

    let output = serde_json::json!({
        "status": result.http_status(),
        "body": result.response_body(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_request(path: Option<String>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path)),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read request from stdin")?;
            Ok(raw)
        }
    }
}
