//! Metadata persistence adapters.

pub mod sqlite_repository;

pub use sqlite_repository::{SqliteMetadataRepository, default_database_path};
