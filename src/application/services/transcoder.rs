//! Format dispatch and transcoding policy.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use super::classifier;
use crate::domain::entities::{ImageKind, MIME_GIF, MIME_SVG, MIME_WEBP, RasterFormat};
use crate::domain::{ImageCodec, ProxyError, ProxyResult};

/// Largest width or height accepted by the WebP encoder.
pub const DEFAULT_MAX_DIMENSION: u32 = 16_383;

/// Output of a transcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    /// Bytes to store and serve.
    pub data: Bytes,
    /// MIME type the input was sniffed as.
    pub original_mime: String,
    /// MIME type of `data`.
    pub optimized_mime: String,
}

/// Applies the per-format policy to a downloaded payload.
pub struct Transcoder {
    codec: Arc<dyn ImageCodec>,
    max_dimension: u32,
}

impl Transcoder {
    /// Creates a transcoder using `codec`, rejecting inputs wider or taller than `max_dimension`.
    #[must_use]
    pub fn new(codec: Arc<dyn ImageCodec>, max_dimension: u32) -> Self {
        Self {
            codec,
            max_dimension,
        }
    }

    /// Converts `data` into its served form.
    ///
    /// `width` and `height` of zero mean "derive from the aspect ratio"; both zero
    /// keeps the original size. Quality is clamped to 0-100.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::UnsupportedFormat`], [`ProxyError::ImageTooLarge`],
    /// [`ProxyError::CorruptedImage`] or [`ProxyError::Transcode`].
    pub fn optimize(
        &self,
        data: &Bytes,
        quality: u32,
        width: u32,
        height: u32,
    ) -> ProxyResult<Transcoded> {
        let kind = classifier::sniff(data);
        let quality = quality.min(100);
        debug!(kind = %kind, size = data.len(), quality, width, height, "Transcoding");

        match kind {
            ImageKind::Gif => {
                #[allow(clippy::cast_precision_loss)]
                let webp = self
                    .codec
                    .gif_to_webp(data, quality as f32)
                    .map_err(|e| match e {
                        ProxyError::Transcode { .. } => e,
                        other => ProxyError::transcode(other.to_string()),
                    })?;
                Ok(Transcoded {
                    data: Bytes::from(webp),
                    original_mime: MIME_GIF.to_string(),
                    optimized_mime: MIME_WEBP.to_string(),
                })
            }
            ImageKind::Webp if is_animated_webp(data) => {
                debug!("Passing animated WebP through");
                Ok(passthrough(data, MIME_WEBP))
            }
            ImageKind::Webp => self.raster(data, RasterFormat::Webp, quality, width, height),
            ImageKind::Svg => Ok(passthrough(data, MIME_SVG)),
            ImageKind::Raster(format) => self.raster(data, format, quality, width, height),
            ImageKind::Unsupported(mime) => {
                warn!(mime = %mime, "Refusing unsupported content");
                Err(ProxyError::unsupported(mime))
            }
        }
    }

    fn raster(
        &self,
        data: &[u8],
        format: RasterFormat,
        quality: u32,
        width: u32,
        height: u32,
    ) -> ProxyResult<Transcoded> {
        let (src_w, src_h) = self.codec.dimensions(data, format)?;
        if src_w > self.max_dimension || src_h > self.max_dimension {
            return Err(ProxyError::ImageTooLarge {
                width: src_w,
                height: src_h,
                limit: self.max_dimension,
            });
        }

        let target = target_size(src_w, src_h, width, height);
        if let Some((w, h)) = target
            && (w > self.max_dimension || h > self.max_dimension)
        {
            return Err(ProxyError::ImageTooLarge {
                width: w,
                height: h,
                limit: self.max_dimension,
            });
        }

        let mut image = self.codec.decode(data, format)?;
        if let Some((w, h)) = target {
            image = self.codec.resize(&image, w, h);
        }

        #[allow(clippy::cast_precision_loss)]
        let webp = self.codec.encode_webp(&image, quality as f32)?;
        Ok(Transcoded {
            data: Bytes::from(webp),
            original_mime: format.mime_type().to_string(),
            optimized_mime: MIME_WEBP.to_string(),
        })
    }
}

fn passthrough(data: &Bytes, mime: &str) -> Transcoded {
    Transcoded {
        data: data.clone(),
        original_mime: mime.to_string(),
        optimized_mime: mime.to_string(),
    }
}

/// Computes the output size, or `None` when no resize is requested.
///
/// A zero side is derived from the source aspect ratio and never drops below one pixel.
#[must_use]
pub fn target_size(src_w: u32, src_h: u32, width: u32, height: u32) -> Option<(u32, u32)> {
    if width == 0 && height == 0 {
        return None;
    }
    let scale = |num: u32, mul: u32, den: u32| -> u32 {
        if den == 0 {
            return num.max(1);
        }
        let scaled = u64::from(num) * u64::from(mul) / u64::from(den);
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    };
    match (width, height) {
        (w, 0) => Some((w, scale(src_h, w, src_w))),
        (0, h) => Some((scale(src_w, h, src_h), h)),
        (w, h) => Some((w, h)),
    }
}

/// Heuristic check for an animated WebP container.
///
/// Looks for `RIFF....WEBPVP8X` followed by an `ANIM` chunk at offset 30, or at
/// offset 38 when an ICC chunk header precedes it. Inputs too short to carry
/// both offsets are reported as animated so they pass through untouched.
#[must_use]
pub fn is_animated_webp(data: &[u8]) -> bool {
    const MIN_LEN: usize = 42;
    if data.len() < MIN_LEN {
        return true;
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" || &data[12..16] != b"VP8X" {
        return false;
    }
    &data[30..34] == b"ANIM" || &data[38..42] == b"ANIM"
}
