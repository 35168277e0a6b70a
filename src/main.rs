//! netwatch - router and internet link monitor
//!
//! Probes the local gateway and an internet host with fping, classifies each
//! result and appends it to a daily log that the status view and the analyzer
//! read back.

mod classify;
mod config;
mod log;
mod probe;
mod scheduler;
mod view;

use clap::{Parser, Subcommand};
use config::{MonitorConfig, DEFAULT_CONFIG_PATH};
use probe::{FpingProber, ProbeConfig};
use scheduler::Scheduler;

use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "netwatch", version, about = "Router and internet link monitor")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, env = "NETWATCH_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe both targets and append results to the daily log
    Monitor,
    /// Show the live status view
    Status {
        /// Render a single frame and exit
        #[arg(long)]
        once: bool,
    },
    /// Summarize every daily log
    Analyze {
        /// Log directory to scan instead of the configured one
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Logs go to stderr; stdout belongs to the status view and the analyzer.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("netwatch=info".parse()?))
        .init();

    let cli = Cli::parse();
    let cfg = MonitorConfig::load(&cli.config)?;

    match cli.command {
        Command::Monitor => {
            tracing::info!("Starting network monitor...");
            tracing::info!("Router address   : {}", cfg.network.router_address);
            tracing::info!("Internet address : {}", cfg.network.internet_address);
            tracing::info!("Log directory    : {}", cfg.network.log_dir.display());

            let prober = FpingProber::new(ProbeConfig::from_network(&cfg.network));
            let mut scheduler = Scheduler::new(cfg, prober);
            scheduler.run(shutdown_channel()).await?;
        }
        Command::Status { once } => {
            view::dashboard::run(&cfg, once, shutdown_channel()).await;
        }
        Command::Analyze { dir } => {
            let dir = dir.unwrap_or_else(|| cfg.network.log_dir.clone());
            view::analyze::run(&dir, &cfg.network.log_prefix)?;
        }
    }

    Ok(())
}

/// A stop channel that fires on Ctrl-C or SIGTERM.
fn shutdown_channel() -> broadcast::Receiver<()> {
    let (tx, rx) = broadcast::channel(1);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutdown signal received");
        let _ = tx.send(());
    });
    rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
