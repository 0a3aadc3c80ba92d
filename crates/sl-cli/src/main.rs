//! Sandloop CLI
//!
//! Drives a multi-round dialogue loop across a small fleet of
//! SSH-reachable nodes and persists the loop report as JSON. Individual
//! round failures do not fail the run; only setup failure or an empty
//! fleet exits nonzero.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sl_core::config::{self, SandloopConfig};
use sl_core::report::LoopStatus;
use sl_core::time::now_millis;
use sl_orchestrator::RoundOrchestrator;

#[derive(Parser)]
#[command(name = "sandloop")]
#[command(about = "Multi-node dialogue round orchestrator")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of rounds to run
    #[arg(short, long, default_value_t = 4)]
    rounds: u32,

    /// Output path for the loop report (defaults to a timestamped file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Sandloop starting...");

    // Load configuration
    let config = if let Some(config_path) = &args.config {
        SandloopConfig::load(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            SandloopConfig::load(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                SandloopConfig::demo_fleet()
            })
        } else {
            tracing::info!("No config file found; using the environment demo fleet");
            SandloopConfig::demo_fleet()
        }
    };
    config.validate().context("Invalid configuration")?;

    // Stop after the in-flight remote operation on interrupt
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, stopping after the in-flight operation...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, stopping after the in-flight operation...");
            }
        }

        cancel_clone.cancel();
    });

    let orchestrator = RoundOrchestrator::new(config, cancel.clone());

    orchestrator.setup().await.context("Sandloop setup failed")?;

    let report = orchestrator.run(args.rounds).await;

    if cancel.is_cancelled() {
        tracing::info!("Interrupted; partial results discarded");
        return Ok(());
    }

    let output_path = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("sandloop_results_{}.json", now_millis())));
    let document = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    std::fs::write(&output_path, document)
        .with_context(|| format!("Failed to write report to {:?}", output_path))?;

    println!("Report saved to: {}", output_path.display());
    println!("Status: {}", report.status);
    println!("Rounds recorded: {}", report.rounds.len());
    println!("Total duration: {:.1}s", report.total_duration_secs);

    if report.status == LoopStatus::Failed {
        anyhow::bail!(
            "loop failed: {}",
            report.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    Ok(())
}
