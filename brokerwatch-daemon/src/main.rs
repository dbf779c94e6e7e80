//! brokerwatch-daemon entry point.
//!
//! Loads configuration, initializes logging and metrics, builds the
//! detector pipeline, and runs until SIGTERM/SIGINT.

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast;

use brokerwatch_core::config::BrokerwatchConfig;
use brokerwatch_core::pipeline::Pipeline;
use brokerwatch_detector::{DetectorConfig, DetectorPipelineBuilder};

use brokerwatch_daemon::cli::DaemonCli;
use brokerwatch_daemon::{logging, metrics_server, runtime};

/// Seconds between pipeline health check log lines.
const HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonCli::parse();

    // Load config, then apply CLI overrides (highest precedence)
    let mut config = BrokerwatchConfig::load(&args.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", args.config.display(), e))?;
    if let Some(level) = &args.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.general.log_format = format.clone();
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if args.validate {
        println!("configuration OK: {}", args.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "brokerwatch-daemon starting"
    );

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
        metrics::gauge!(
            brokerwatch_core::metrics::DAEMON_BUILD_INFO,
            "version" => env!("CARGO_PKG_VERSION")
        )
        .set(1.0);
        tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
    }

    if let Some(pid_path) = &args.pid_file {
        runtime::write_pid_file(pid_path)?;
    }

    let run_result = run(&config).await;

    if let Some(pid_path) = &args.pid_file {
        runtime::remove_pid_file(pid_path);
    }
    run_result
}

/// Build the pipeline, run until a shutdown signal, then stop it.
async fn run(config: &BrokerwatchConfig) -> Result<()> {
    let start_time = Instant::now();
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let detector_config = DetectorConfig::from_core(config);
    let (mut pipeline, alert_rx) = DetectorPipelineBuilder::new()
        .config(detector_config)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build detector pipeline: {}", e))?;
    tracing::info!("detector pipeline initialized");

    let mut alert_task = alert_rx.map(|rx| runtime::spawn_alert_logger(rx, shutdown_tx.subscribe()));
    let mut uptime_task = config
        .metrics
        .enabled
        .then(|| runtime::spawn_uptime_updater(start_time, shutdown_tx.subscribe()));

    pipeline
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("failed to start detector pipeline: {}", e))?;
    tracing::info!("detector pipeline started");

    // Main loop: wait for shutdown, logging pipeline health along the way
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;
    let mut health_interval =
        tokio::time::interval(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS));
    health_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    health_interval.tick().await; // First tick fires immediately

    tracing::info!("entering main event loop");
    let signal_name = loop {
        tokio::select! {
            _ = sigterm.recv() => break "SIGTERM",
            _ = sigint.recv() => break "SIGINT",
            _ = health_interval.tick() => {
                let health = pipeline.health_check().await;
                if health.is_healthy() {
                    tracing::debug!(status = %health, "pipeline health check");
                } else {
                    tracing::warn!(status = %health, "pipeline health check");
                }
            }
        }
    };
    tracing::info!(signal = signal_name, "shutdown signal received");

    let _ = shutdown_tx.send(());
    if let Some(task) = alert_task.take() {
        let _ = task.await;
    }
    if let Some(task) = uptime_task.take() {
        let _ = task.await;
    }

    if let Err(e) = pipeline.stop().await {
        tracing::error!(error = %e, "failed to stop detector pipeline");
    }

    tracing::info!("brokerwatch-daemon shut down");
    Ok(())
}
