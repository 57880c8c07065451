//! # bridgewire-agent
//!
//! Standalone bridge client: loads settings, connects to the service and
//! answers it with a console-only host until interrupted.

#![deny(unsafe_code)]

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bridgewire_client::{BridgeBehavior, BridgeClient, ClientProfile};
use bridgewire_core::ExtensionInfo;
use bridgewire_rpc::{MethodInfo, RpcError, rpc_fn};
use bridgewire_settings::BridgeSettings;
use clap::Parser;
use serde_json::json;

use crate::console::ConsoleBehavior;

/// Bridgewire agent.
#[derive(Parser, Debug)]
#[command(name = "bridgewire-agent", about = "Bridgewire client agent")]
struct Cli {
    /// Service URL (overrides settings).
    #[arg(long)]
    url: Option<String>,

    /// Access token (overrides settings).
    #[arg(long, env = "BRIDGEWIRE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Settings file (defaults to `~/.bridgewire/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log filter when `RUST_LOG` is unset (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,
}

/// Settings file, env overrides, then command-line flags.
fn resolve_settings(cli: &Cli) -> Result<BridgeSettings> {
    let path = cli
        .settings
        .clone()
        .unwrap_or_else(bridgewire_settings::settings_path);
    let mut settings = bridgewire_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    if let Some(url) = &cli.url {
        settings.connection.url.clone_from(url);
    }
    if let Some(token) = &cli.token {
        settings.connection.token.clone_from(token);
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    if cli.json_logs {
        settings.logging.json = true;
    }

    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

/// RPC methods the agent itself exposes.
fn register_agent_methods(client: &BridgeClient) {
    let ext = ExtensionInfo::new("bridgewire-agent", "Bridgewire Agent")
        .with_description("Standalone bridge client")
        .with_version(env!("CARGO_PKG_VERSION"));

    let _ = client.router().register(
        &ext,
        "ping",
        MethodInfo::new("Ping", "Liveness check"),
        rpc_fn(|_request| async { Ok::<_, RpcError>(json!("pong")) }),
    );
    let _ = client.router().register(
        &ext,
        "version",
        MethodInfo::new("Version", "Agent version"),
        rpc_fn(|_request| async { Ok::<_, RpcError>(json!({ "version": env!("CARGO_PKG_VERSION") })) }),
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;

    if settings.logging.json {
        bridgewire_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        bridgewire_core::logging::init_subscriber(&settings.logging.level);
    }

    let behavior: Arc<dyn BridgeBehavior> =
        Arc::new(ConsoleBehavior::new(&ClientProfile::from(&settings.profile)));
    let client = BridgeClient::builder(settings, behavior).build();
    register_agent_methods(&client);

    tracing::info!(url = %client.url(), "starting bridgewire agent");
    client.connect().context("Failed to start connecting")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    client.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["bridgewire-agent"]);
        assert!(cli.url.is_none());
        assert!(cli.settings.is_none());
        assert!(!cli.json_logs);
    }

    #[test]
    fn flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"connection": {"url": "ws://file.test/ws", "token": "from-file"}, "logging": {"level": "debug"}}"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "bridgewire-agent",
            "--settings",
            path.to_str().unwrap(),
            "--url",
            "wss://flag.test/ws",
            "--json-logs",
        ]);
        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(settings.connection.url, "wss://flag.test/ws");
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn rejects_non_websocket_url() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "bridgewire-agent",
            "--settings",
            dir.path().join("missing.json").to_str().unwrap(),
            "--url",
            "http://example.test",
        ]);
        assert!(resolve_settings(&cli).is_err());
    }

    #[tokio::test]
    async fn agent_methods_are_routed() {
        let settings = BridgeSettings::default();
        let behavior: Arc<dyn BridgeBehavior> =
            Arc::new(ConsoleBehavior::new(&ClientProfile::from(&settings.profile)));
        let client = BridgeClient::builder(settings, behavior).build();
        register_agent_methods(&client);

        let pong = client
            .router()
            .call(bridgewire_rpc::RpcRequest::local("bridgewire-agent", "ping", json!(null)))
            .await
            .unwrap();
        assert_eq!(pong, json!("pong"));
        client.shutdown().await;
    }
}
