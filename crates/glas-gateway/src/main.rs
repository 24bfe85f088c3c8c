//! # glas-gateway
//!
//! Gateway binary: loads settings, starts the WebSocket server, and relays
//! each session to the configured line-oriented TCP upstream.

#![deny(unsafe_code)]

mod logging;
mod upstream;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use glas_core::InstructionGrammar;
use glas_server::{GatewayServer, ServerConfig};
use glas_settings::GatewaySettings;
use tracing::info;

use crate::upstream::TcpEngineFactory;

/// Glas WebSocket gateway.
#[derive(Parser, Debug)]
#[command(name = "glas-gateway", about = "WebSocket gateway for a line-oriented upstream")]
struct Cli {
    /// Settings file (defaults to `~/.glas/gateway.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Upstream host (overrides settings).
    #[arg(long)]
    upstream_host: Option<String>,

    /// Upstream port (overrides settings).
    #[arg(long)]
    upstream_port: Option<u16>,
}

impl Cli {
    /// Apply command-line flags over loaded settings.
    fn apply(&self, settings: &mut GatewaySettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(host) = &self.upstream_host {
            settings.upstream.host.clone_from(host);
        }
        if let Some(port) = self.upstream_port {
            settings.upstream.port = port;
        }
    }
}

/// Load, override, and validate settings.
fn resolve_settings(cli: &Cli) -> Result<GatewaySettings> {
    let path = cli.config.clone().unwrap_or_else(glas_settings::settings_path);
    let mut settings = glas_settings::load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

fn server_config(settings: &GatewaySettings) -> ServerConfig {
    let server = &settings.server;
    ServerConfig {
        host: server.host.clone(),
        port: server.port,
        route_prefix: server.route_prefix.clone(),
        max_message_size: server.max_message_size,
        teardown_timeout_ms: server.teardown_timeout_ms,
        close_notice: server.close_notice.clone(),
        allowed_origins: server.allowed_origins.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    logging::init_subscriber(&settings.logging);

    let metrics =
        glas_server::metrics::install_recorder().context("Failed to install metrics recorder")?;
    let factory = Arc::new(TcpEngineFactory::new(&settings.upstream));
    let grammar = Arc::new(InstructionGrammar::new(
        &settings.protocol.marker,
        &settings.protocol.separator,
    ));

    let server = GatewayServer::new(server_config(&settings), factory.clone())
        .with_grammar(grammar)
        .with_metrics(metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!(
        upstream = factory.address(),
        "glas gateway listening on ws://{addr}{}",
        server.config().connect_path()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("shutting down");
    let timeout = Duration::from_millis(settings.server.shutdown_timeout_ms);
    server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(timeout))
        .await;

    info!("shutdown complete");
    Ok(())
}
