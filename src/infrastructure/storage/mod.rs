//! Object storage adapters.

pub mod disk_store;
pub mod sweeper;

pub use disk_store::{DiskObjectStore, default_object_dir};
pub use sweeper::StoreSweeper;
