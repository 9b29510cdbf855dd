//! Domain layer with core value objects, error types, and port definitions.

/// Entity and value object definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{
    CacheKey, ImageKind, ImageMetadata, LogicalRequest, ObjectHash, OptimizedImage, RasterFormat,
};
pub use errors::{MetadataError, MetadataResult, ProxyError, ProxyResult, StoreError, StoreResult};
pub use ports::{ImageCodec, MetadataRepository, ObjectStorePort, UpstreamFetcherPort};
