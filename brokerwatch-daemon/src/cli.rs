//! CLI argument definitions for brokerwatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Brokerwatch broker monitoring daemon.
///
/// Tails the broker log, maintains the host/connection graph, and
/// blocks hosts whose active connection count exceeds the threshold.
#[derive(Parser, Debug)]
#[command(name = "brokerwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to brokerwatch.toml configuration file.
    #[arg(short, long, default_value = "/etc/brokerwatch/brokerwatch.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Write a PID file at the given path while the daemon is running.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}
