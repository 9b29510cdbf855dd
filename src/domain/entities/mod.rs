//! Domain entity definitions.

mod format;
mod metadata;
mod request;

pub use format::{
    ImageKind, MIME_BMP, MIME_GIF, MIME_JPEG, MIME_PNG, MIME_PSD, MIME_SVG, MIME_UNKNOWN,
    MIME_WEBP, RasterFormat,
};
pub use metadata::{ImageMetadata, OptimizedImage};
pub use request::{CacheKey, LogicalRequest, ObjectHash};
