//! Daemon runtime helpers -- PID file handling and background tasks.
//!
//! These helpers are kept out of `main.rs` so they can be unit tested.

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use brokerwatch_core::event::AlertEvent;
use brokerwatch_core::metrics::DAEMON_UPTIME_SECONDS;

/// Write the current process PID to a file.
///
/// Used to prevent duplicate daemon instances. The file is created
/// atomically with `create_new`, so a concurrent start loses the race
/// instead of silently overwriting.
///
/// # Errors
///
/// Returns an error if the file already exists or cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            let mut builder = fs::DirBuilder::new();
            builder.mode(0o700).recursive(true);
            builder.create(parent)?;
        }
        #[cfg(not(unix))]
        {
            fs::create_dir_all(parent)?;
        }
    }

    let pid = std::process::id();
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    // Reject symlinks and other special files
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        let _ = fs::remove_file(path);
        return Err(anyhow::anyhow!(
            "PID file {} is not a regular file",
            path.display()
        ));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    writeln!(file, "{}", pid)?;
    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file on daemon shutdown.
///
/// Logs a warning but does not fail if the file cannot be removed.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file");
    } else {
        tracing::info!(path = %path.display(), "PID file removed");
    }
}

/// Spawn a background task that logs received alert events.
///
/// The detector emits an [`AlertEvent`] when a host crosses the
/// connection threshold. The daemon records them for audit purposes;
/// actual delivery (e-mail etc.) is handled by the notification sink
/// inside the detector.
pub fn spawn_alert_logger(
    mut alert_rx: mpsc::Receiver<AlertEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                alert_result = alert_rx.recv() => {
                    match alert_result {
                        Some(event) => {
                            tracing::warn!(
                                alert_id = %event.id,
                                rule = %event.alert.rule_name,
                                severity = %event.severity,
                                description = %event.alert.description,
                                "host alert"
                            );
                        }
                        None => {
                            tracing::debug!("alert channel closed, exiting logger");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("alert logger shutting down");
                    break;
                }
            }
        }
    })
}

/// Spawn a background task that periodically updates the uptime metric.
///
/// Updates every 10 seconds to keep the metric fresh for Prometheus
/// scrapes.
pub fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
