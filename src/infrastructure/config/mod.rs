//! Application configuration.

pub mod app_config;
pub mod args;
pub mod loader;

pub use app_config::{
    AppConfig, FetchConfig, LogLevel, MetadataConfig, NegativeCacheConfig, SecurityConfig,
    ServerConfig, StorageConfig, TranscodeConfig,
};
pub use args::CliArgs;
pub use loader::{ConfigError, ConfigLoader};
