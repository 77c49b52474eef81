//! Main entry point for the edge gateway server

mod config;
mod logging;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_gateway::ApiGateway;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use jwt_authn_plugin::JwtAuthNResolver;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{AppConfig, MetricsConfig};

#[derive(Parser)]
#[command(name = "edge-gateway-server", about = "Stateless bearer-token edge gateway", version)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the effective configuration (secret redacted) and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref())?;
    if args.print_config {
        println!("{}", config.to_pretty_json()?);
        return Ok(());
    }

    logging::init(&config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting edge gateway");

    init_metrics(&config.metrics)?;

    let resolver = JwtAuthNResolver::from_config(&config.jwt)?;
    let gateway = ApiGateway::new(config.api_gateway, Arc::new(resolver));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            cancel.cancel();
        }
    });

    match gateway.serve(cancel).await {
        Ok(()) => {
            info!("Edge gateway shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Edge gateway error");
            Err(e)
        }
    }
}

/// Install the Prometheus exporter when enabled.
fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid metrics bind address '{}'", config.bind_addr))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics exporter: {e}"))?;
    api_gateway::fallback::describe_metrics();

    info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
