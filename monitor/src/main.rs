// Monitor binary entry point

use anyhow::Result;
use clap::Parser;
use common::bootstrap::{init_notification_sink, init_state_store, init_submission_source};
use common::config::{write_sample_config, LogFormat, Settings, DEFAULT_CONFIG_PATH};
use common::monitor::{Monitor, MonitorEngine};
use common::telemetry::{init_logging, init_metrics};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Watch AtCoder users and announce each problem they solve for the first time
#[derive(Parser, Debug)]
#[command(name = "ac-monitor", version, about)]
struct Args {
    /// Configuration file (json, toml or yaml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "AC_MONITOR_CONFIG")]
    config: PathBuf,

    /// Check every user once and exit
    #[arg(long, env = "AC_MONITOR_ONCE")]
    once: bool,

    /// Write a sample configuration to --config and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init_config {
        write_sample_config(&args.config)?;
        println!("Sample configuration written to {}", args.config.display());
        return Ok(());
    }

    let settings = match Settings::load_from_path(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            init_logging("info", LogFormat::Json)?;
            error!(error = %e, path = %args.config.display(), "Failed to load configuration");
            return Err(e.into());
        }
    };

    init_logging(
        &settings.observability.log_level,
        settings.observability.log_format,
    )?;
    info!(path = %args.config.display(), "Starting AtCoder AC monitor");

    let monitor_config = settings.monitor_config().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })?;

    if let Some(port) = settings.observability.metrics_port {
        init_metrics(port)?;
    }

    let source = init_submission_source(&settings)?;
    let store = init_state_store(&settings);
    let sink = init_notification_sink(&settings)?;

    let engine = Arc::new(MonitorEngine::new(monitor_config, source, store, sink));
    info!(users = ?engine.config().users, "Monitor engine created");

    if args.once {
        let summary = engine.run_once().await;
        info!(
            users_checked = summary.users_checked,
            users_failed = summary.users_failed,
            notifications = summary.notifications,
            "Single check finished"
        );
        return Ok(());
    }

    let engine_for_shutdown = engine.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        engine_for_shutdown.stop().await;
    });

    if let Err(e) = engine.start().await {
        error!(error = %e, "Monitor error");
        return Err(e.into());
    }

    info!("Monitor stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Initiating graceful shutdown");
}
