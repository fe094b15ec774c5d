use std::path::PathBuf;

use clap::Parser;

/// The native peer: terminates HTTP, matches routes, and proxies
/// script-kind handlers to the companion process over the IPC socket.
#[derive(Debug, Parser)]
#[command(name = "zap-native", version)]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long)]
    pub config: PathBuf,

    /// Path to the IPC socket to dial into (the script process listens).
    #[arg(long)]
    pub socket: PathBuf,

    /// Override the configured listening port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the configured listening hostname.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Log level, overriding `RUST_LOG` when set.
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
