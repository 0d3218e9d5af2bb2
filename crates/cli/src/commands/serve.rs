//! `palaver serve` — Start the JSON-RPC HTTP endpoint.

use anyhow::Context;
use palaver_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load_or_default().context("Failed to load config")?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Palaver");
    println!(
        "   Listening: {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("   Model:     {}", config.model_id);
    println!("   Store:     {}", config.store.backend);

    palaver_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}
