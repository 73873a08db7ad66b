//! wakegated — the wakegate daemon.
//!
//! Single binary that assembles the wakegate subsystems:
//! - Compute Engine client for the managed instance
//! - TCP reachability prober for the backend
//! - Lifecycle controller (start on demand, idle/no-join shutdown)
//! - Allow-list and connection gate
//! - Event intake API for the proxy
//!
//! # Usage
//!
//! ```text
//! wakegated run --config /etc/wakegate/wakegate.toml
//! wakegated check-config --config wakegate.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use wakegate_access::AllowList;
use wakegate_compute::GceClient;
use wakegate_config::WakegateConfig;
use wakegate_gate::ConnectionGate;
use wakegate_lifecycle::LifecycleController;
use wakegate_probe::TcpProber;

#[derive(Parser)]
#[command(name = "wakegated", about = "wakegate daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon.
    Run {
        /// Path to the configuration file.
        #[arg(long, default_value = "wakegate.toml")]
        config: PathBuf,

        /// Override `[api] listen`.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Load and validate the configuration, then exit.
    CheckConfig {
        #[arg(long, default_value = "wakegate.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wakegated=debug,wakegate=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, listen } => run(&config, listen).await,
        Command::CheckConfig { config } => check_config(&config),
    }
}

fn load_config(path: &Path) -> anyhow::Result<WakegateConfig> {
    WakegateConfig::from_file(path)
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    info!(
        server = %config.controller.server_address,
        backend = %config.controller.backend_addr,
        project = %config.compute.project,
        zone = %config.compute.zone,
        instance = %config.compute.instance,
        listen = %config.api.listen,
        "configuration is valid"
    );
    Ok(())
}

async fn run(path: &Path, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    info!("wakegate daemon starting");

    let config = load_config(path)?;

    // ── Initialize subsystems ──────────────────────────────────

    let compute = Arc::new(
        GceClient::new(&config.compute, config.controller.operation_timeout)
            .context("failed to build compute client")?,
    );
    info!(instance = %config.compute.instance, endpoint = %config.compute.endpoint, "compute client initialized");

    let prober = Arc::new(TcpProber::new(config.controller.probe_timeout));

    let lifecycle = LifecycleController::new(config.controller.clone(), compute, prober);

    let allow_list = Arc::new(
        AllowList::load(&config.access)
            .with_context(|| format!("failed to load allow-list {}", config.access.file.display()))?,
    );

    let gate = ConnectionGate::new(lifecycle.clone()).with_guard(allow_list.clone());
    info!(guards = ?gate.guards(), "connection gate initialized");

    // ── Start API server ───────────────────────────────────────

    let router = wakegate_api::build_router(gate, allow_list);
    let addr = listen.unwrap_or(config.api.listen);

    info!(%addr, "event intake listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    lifecycle.shutdown().await;

    info!("wakegate daemon stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_listen_override() {
        let cli = Cli::try_parse_from([
            "wakegated",
            "run",
            "--config",
            "/etc/wakegate.toml",
            "--listen",
            "127.0.0.1:9000",
        ])
        .unwrap();
        match cli.command {
            Command::Run { config, listen } => {
                assert_eq!(config, PathBuf::from("/etc/wakegate.toml"));
                assert_eq!(listen, Some("127.0.0.1:9000".parse().unwrap()));
            }
            Command::CheckConfig { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn check_config_rejects_missing_required_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wakegate.toml");
        std::fs::write(&path, "[controller]\nserver_address = \"survival\"\n").unwrap();

        let err = check_config(&path).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn check_config_accepts_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wakegate.toml");
        std::fs::write(
            &path,
            r#"
[controller]
server_address = "survival"
backend_addr = "10.0.0.5:25565"

[compute]
project = "games"
zone = "europe-west1-b"
instance = "survival-vm"
access_token = "static"
"#,
        )
        .unwrap();

        check_config(&path).unwrap();
    }
}
