//! `palaver call` — One-shot local dispatch for smoke testing.
//!
//! Builds the same store, backend router, and dispatcher the server would
//! run, sends a single envelope through it, and prints the response.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{Value, json};

use palaver_config::AppConfig;
use palaver_protocol::Dispatcher;

pub async fn run(method: &str, params: &str) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default().context("Failed to load config")?;

    let params: Value = serde_json::from_str(params).context("--params must be a JSON object")?;

    let store = palaver_gateway::build_store(&config)
        .await
        .context("Failed to open conversation store")?;
    let router = palaver_backends::build_from_config(&config);
    let dispatcher = Arc::new(Dispatcher::new(&config, store, router));

    let envelope = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    match dispatcher.handle(&envelope.to_string()).await {
        Some(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        None => {
            println!("(notification, no response)");
        }
    }

    Ok(())
}
