//! Port definition for image codecs.

use crate::domain::entities::RasterFormat;
use crate::domain::errors::ProxyResult;

/// Pluggable decode/resize/encode capabilities.
///
/// All methods are CPU-bound and synchronous; callers run them off the async
/// executor.
pub trait ImageCodec: Send + Sync {
    /// Reads the pixel dimensions from the header without decoding pixels.
    fn dimensions(&self, data: &[u8], format: RasterFormat) -> ProxyResult<(u32, u32)>;

    /// Decodes a still image.
    fn decode(&self, data: &[u8], format: RasterFormat) -> ProxyResult<image::DynamicImage>;

    /// Resizes to exactly `width` x `height`.
    fn resize(&self, image: &image::DynamicImage, width: u32, height: u32)
    -> image::DynamicImage;

    /// Encodes lossy WebP at `quality` (0-100).
    fn encode_webp(&self, image: &image::DynamicImage, quality: f32) -> ProxyResult<Vec<u8>>;

    /// Converts a (possibly animated) GIF into a WebP, keeping every frame.
    fn gif_to_webp(&self, data: &[u8], quality: f32) -> ProxyResult<Vec<u8>>;
}
