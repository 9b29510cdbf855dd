use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Command line arguments. Each one overrides its config file counterpart.
#[derive(Debug, Default, Parser)]
#[command(
    name = "optiproxy",
    version,
    about = "An image-optimizing caching proxy",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", env = "OPTIPROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Socket address to listen on.
    #[arg(short, long, value_name = "ADDR", env = "OPTIPROXY_LISTEN")]
    pub listen: Option<String>,

    /// Directory holding optimized objects.
    #[arg(long, value_name = "PATH")]
    pub object_dir: Option<PathBuf>,

    /// Object store budget in megabytes.
    #[arg(long, value_name = "MB")]
    pub max_size_mb: Option<u64>,

    /// SQLite metadata database file.
    #[arg(long, value_name = "PATH", env = "OPTIPROXY_DATABASE")]
    pub database_path: Option<PathBuf>,

    /// Quality used by the legacy route.
    #[arg(long)]
    pub default_quality: Option<u32>,
}
