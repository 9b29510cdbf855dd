//! Domain error types.

mod metadata_error;
mod proxy_error;
mod store_error;

pub use metadata_error::{MetadataError, MetadataResult};
pub use proxy_error::{ProxyError, ProxyResult};
pub use store_error::{StoreError, StoreResult};
