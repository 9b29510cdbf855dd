//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Upstream image downloads.
pub mod http;
/// Image decoding and encoding.
pub mod image;
/// SQLite metadata store.
pub mod metadata;
/// On-disk object store and its sweeper.
pub mod storage;

pub use config::{AppConfig, CliArgs, ConfigError, ConfigLoader, LogLevel};
pub use http::HttpUpstreamFetcher;
pub use image::StandardImageCodec;
pub use metadata::SqliteMetadataRepository;
pub use storage::{DiskObjectStore, StoreSweeper};
