//! Services composed by the optimization pipeline.

pub mod classifier;
pub mod coalescer;
pub mod memory_cache;
pub mod metadata_manager;
pub mod negative_cache;
pub mod normalizer;
pub mod object_cache;
pub mod transcoder;

pub use coalescer::RequestCoalescer;
pub use memory_cache::{CacheStats, TtlLruCache};
pub use metadata_manager::MetadataManager;
pub use negative_cache::NegativeResultCache;
pub use normalizer::{Normalized, Redirect, RewriteRules, UrlNormalizer};
pub use object_cache::ObjectCache;
pub use transcoder::{Transcoded, Transcoder};
