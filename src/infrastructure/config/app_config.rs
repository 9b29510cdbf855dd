//! Application configuration.

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use crate::application::RewriteRules;

const APP_NAME: &str = "optiproxy";
const APP_QUALIFIER: &str = "org";
const APP_ORGANIZATION: &str = "optiproxy";

/// Browser identity sent to origins, some of which refuse unknown clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/106.0.0.0 Safari/537.36";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path. Logs go to stdout when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Object store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Metadata store settings.
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Failure cache settings.
    #[serde(default)]
    pub negative_cache: NegativeCacheConfig,

    /// Upstream download settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// URL rewrite rules.
    #[serde(default)]
    pub rewrite: RewriteRules,

    /// Transcoder limits.
    #[serde(default)]
    pub transcode: TranscodeConfig,

    /// Headers attached to every response.
    #[serde(default)]
    pub security: SecurityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Seconds in-flight requests get to finish after a shutdown signal.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,

    /// Quality used by the legacy route.
    #[serde(default = "default_quality")]
    pub default_quality: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            shutdown_grace_secs: default_shutdown_grace(),
            default_quality: default_quality(),
        }
    }
}

/// Object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding optimized objects.
    #[serde(default)]
    pub object_dir: Option<PathBuf>,

    /// Store budget in megabytes.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Hash characters used as shard directory name.
    #[serde(default = "default_shard_prefix_len")]
    pub shard_prefix_len: usize,

    /// Seconds between store sweeps.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            object_dir: None,
            max_size_mb: default_max_size_mb(),
            shard_prefix_len: default_shard_prefix_len(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

/// Metadata store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// SQLite database file.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Records kept in memory.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Lifetime of an in-memory record, in seconds.
    #[serde(default = "default_metadata_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_metadata_ttl(),
        }
    }
}

/// Failure cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegativeCacheConfig {
    /// Failures remembered at once.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Seconds a failure is remembered.
    #[serde(default = "default_negative_ttl")]
    pub ttl_secs: u64,
}

impl Default for NegativeCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_negative_ttl(),
        }
    }
}

/// Upstream download configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Pause before retrying a 502, in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// User-Agent header sent upstream.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            retry_delay_ms: default_retry_delay(),
            user_agent: default_user_agent(),
        }
    }
}

/// Transcoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Largest accepted source width or height.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
        }
    }
}

/// Response security headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// `Content-Security-Policy` value. Passed-through SVGs must not run script.
    #[serde(default = "default_content_security_policy")]
    pub content_security_policy: String,

    /// `Report-To` value, sent only when set.
    #[serde(default)]
    pub report_to: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            content_security_policy: default_content_security_policy(),
            report_to: None,
        }
    }
}

fn default_content_security_policy() -> String {
    "script-src 'none'".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:6456".to_string()
}

const fn default_shutdown_grace() -> u64 {
    5
}

const fn default_quality() -> u32 {
    85
}

const fn default_max_size_mb() -> u64 {
    1024
}

const fn default_shard_prefix_len() -> usize {
    2
}

const fn default_cleanup_interval() -> u64 {
    30
}

const fn default_cache_capacity() -> usize {
    10_000
}

const fn default_metadata_ttl() -> u64 {
    24 * 60 * 60
}

const fn default_negative_ttl() -> u64 {
    120
}

const fn default_fetch_timeout() -> u64 {
    20
}

const fn default_retry_delay() -> u64 {
    100
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

const fn default_max_dimension() -> u32 {
    16_383
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: CliArgs) {
        if let Some(config_path) = args.config {
            self.config = Some(config_path);
        }
        if let Some(log_path) = args.log_path {
            self.log_path = Some(log_path);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(listen) = args.listen {
            self.server.listen = listen;
        }
        if let Some(object_dir) = args.object_dir {
            self.storage.object_dir = Some(object_dir);
        }
        if let Some(max_size_mb) = args.max_size_mb {
            self.storage.max_size_mb = max_size_mb;
        }
        if let Some(database_path) = args.database_path {
            self.metadata.database_path = Some(database_path);
        }
        if let Some(default_quality) = args.default_quality {
            self.server.default_quality = default_quality;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns the effective object directory.
    #[must_use]
    pub fn effective_object_dir(&self) -> PathBuf {
        self.storage
            .object_dir
            .clone()
            .unwrap_or_else(crate::infrastructure::storage::default_object_dir)
    }

    /// Returns the effective metadata database path.
    #[must_use]
    pub fn effective_database_path(&self) -> PathBuf {
        self.metadata
            .database_path
            .clone()
            .unwrap_or_else(crate::infrastructure::metadata::default_database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let toml_content = r#"
            log_level = "debug"

            [server]
            listen = "127.0.0.1:8080"

            [storage]
            max_size_mb = 64

            [rewrite]
            self_hosts = ["https://img.example.net"]
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.server.listen, "127.0.0.1:8080");
        assert_eq!(config.server.default_quality, 85);
        assert_eq!(config.storage.max_size_mb, 64);
        assert_eq!(config.storage.shard_prefix_len, 2);
        assert_eq!(config.rewrite.self_hosts, vec!["https://img.example.net"]);
        assert_eq!(config.rewrite.legacy_host, "https://spee.ch/");
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.shutdown_grace_secs, 5);
        assert_eq!(config.negative_cache.ttl_secs, 120);
        assert_eq!(config.metadata.cache_ttl_secs, 86_400);
        assert_eq!(config.fetch.timeout_secs, 20);
        assert_eq!(config.transcode.max_dimension, 16_383);
        assert_eq!(config.security.content_security_policy, "script-src 'none'");
        assert!(config.security.report_to.is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config = AppConfig::default();
        config.merge_with_args(CliArgs {
            listen: Some("127.0.0.1:9000".to_string()),
            default_quality: Some(60),
            ..CliArgs::default()
        });

        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.server.default_quality, 60);
        assert_eq!(config.storage.max_size_mb, 1024);
    }
}
