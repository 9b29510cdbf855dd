//! Port definitions implemented by infrastructure adapters.

mod image_codec_port;
mod metadata_repository_port;
mod object_store_port;
mod upstream_fetcher_port;

pub use image_codec_port::ImageCodec;
pub use metadata_repository_port::MetadataRepository;
#[cfg(test)]
pub use object_store_port::MockObjectStorePort;
pub use object_store_port::ObjectStorePort;
pub use upstream_fetcher_port::UpstreamFetcherPort;
