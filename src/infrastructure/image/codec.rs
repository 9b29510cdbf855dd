//! Image codec backed by the `image`, `webp` and `psd` crates.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat, ImageReader, RgbaImage};
use psd::Psd;
use tracing::trace;

use crate::domain::{ImageCodec, ProxyError, ProxyResult, RasterFormat};

/// libwebp effort level used for animations.
const ANIMATION_METHOD: i32 = 4;

/// Default codec implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardImageCodec;

impl StandardImageCodec {
    /// Creates the codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn image_format(format: RasterFormat) -> Option<ImageFormat> {
        match format {
            RasterFormat::Jpeg => Some(ImageFormat::Jpeg),
            RasterFormat::Png => Some(ImageFormat::Png),
            RasterFormat::Bmp => Some(ImageFormat::Bmp),
            RasterFormat::Webp => Some(ImageFormat::WebP),
            RasterFormat::Psd => None,
        }
    }

    fn parse_psd(data: &[u8]) -> ProxyResult<Psd> {
        Psd::from_bytes(data).map_err(|e| ProxyError::corrupted(e.to_string()))
    }
}

impl ImageCodec for StandardImageCodec {
    fn dimensions(&self, data: &[u8], format: RasterFormat) -> ProxyResult<(u32, u32)> {
        let Some(image_format) = Self::image_format(format) else {
            let psd = Self::parse_psd(data)?;
            return Ok((psd.width(), psd.height()));
        };
        ImageReader::with_format(Cursor::new(data), image_format)
            .into_dimensions()
            .map_err(|e| ProxyError::corrupted(e.to_string()))
    }

    fn decode(&self, data: &[u8], format: RasterFormat) -> ProxyResult<DynamicImage> {
        let Some(image_format) = Self::image_format(format) else {
            let psd = Self::parse_psd(data)?;
            let rgba = RgbaImage::from_raw(psd.width(), psd.height(), psd.rgba())
                .ok_or_else(|| ProxyError::corrupted("flattened PSD has unexpected size"))?;
            return Ok(DynamicImage::ImageRgba8(rgba));
        };
        image::load_from_memory_with_format(data, image_format)
            .map_err(|e| ProxyError::corrupted(e.to_string()))
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        trace!(from_w = image.width(), from_h = image.height(), width, height, "Resizing");
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn encode_webp(&self, image: &DynamicImage, quality: f32) -> ProxyResult<Vec<u8>> {
        let rgba = image.to_rgba8();
        let encoded = webp::Encoder::from_rgba(&rgba, rgba.width(), rgba.height())
            .encode_simple(false, quality)
            .map_err(|e| ProxyError::transcode(format!("WebP encoding failed: {e:?}")))?;
        Ok(encoded.to_vec())
    }

    fn gif_to_webp(&self, data: &[u8], quality: f32) -> ProxyResult<Vec<u8>> {
        let decoder =
            GifDecoder::new(Cursor::new(data)).map_err(|e| ProxyError::transcode(e.to_string()))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| ProxyError::transcode(e.to_string()))?;
        let Some(first) = frames.first() else {
            return Err(ProxyError::transcode("GIF has no frames"));
        };
        let (width, height) = first.buffer().dimensions();

        let mut config = webp::WebPConfig::new()
            .map_err(|()| ProxyError::transcode("failed to initialise WebP config"))?;
        config.quality = quality;
        config.method = ANIMATION_METHOD;
        config.lossless = 0;

        let mut encoder = webp::AnimEncoder::new(width, height, &config);
        encoder.set_loop_count(0);

        let mut timestamp_ms: i32 = 0;
        for frame in &frames {
            let buffer = frame.buffer();
            if buffer.dimensions() != (width, height) {
                return Err(ProxyError::transcode("GIF frames differ in size"));
            }
            encoder.add_frame(webp::AnimFrame::from_rgba(buffer, width, height, timestamp_ms));
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = numer.checked_div(denom).unwrap_or(0).max(1);
            timestamp_ms = timestamp_ms.saturating_add(i32::try_from(delay).unwrap_or(i32::MAX));
        }

        let encoded = encoder
            .try_encode()
            .map_err(|e| ProxyError::transcode(format!("animated WebP encoding failed: {e:?}")))?;
        trace!(frames = frames.len(), size = encoded.len(), "Encoded animated WebP");
        Ok(encoded.to_vec())
    }
}
