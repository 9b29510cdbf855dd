//! Byte-signature classification of upstream payloads.

use image::ImageFormat;

use crate::domain::entities::{ImageKind, RasterFormat};

const PSD_MAGIC: &[u8] = b"8BPS";
const SNIFF_LEN: usize = 512;

/// Classifies `data` by its leading bytes. Declared content types are never consulted.
#[must_use]
pub fn sniff(data: &[u8]) -> ImageKind {
    if data.starts_with(PSD_MAGIC) {
        return ImageKind::Raster(RasterFormat::Psd);
    }

    match image::guess_format(data) {
        Ok(ImageFormat::Gif) => ImageKind::Gif,
        Ok(ImageFormat::WebP) => ImageKind::Webp,
        Ok(ImageFormat::Jpeg) => ImageKind::Raster(RasterFormat::Jpeg),
        Ok(ImageFormat::Png) => ImageKind::Raster(RasterFormat::Png),
        Ok(ImageFormat::Bmp) => ImageKind::Raster(RasterFormat::Bmp),
        Ok(other) => ImageKind::Unsupported(other.to_mime_type().to_string()),
        Err(_) if is_svg(data) => ImageKind::Svg,
        Err(_) => ImageKind::Unsupported(fallback_mime(data).to_string()),
    }
}

fn leading_text(data: &[u8]) -> String {
    let head = &data[..data.len().min(SNIFF_LEN)];
    String::from_utf8_lossy(head).to_ascii_lowercase()
}

fn is_svg(data: &[u8]) -> bool {
    let text = leading_text(data);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    if text.starts_with("<svg") {
        return true;
    }
    text.starts_with("<?xml") && text.contains("<svg")
}

fn fallback_mime(data: &[u8]) -> &'static str {
    let head = &data[..data.len().min(SNIFF_LEN)];
    let binary = head
        .iter()
        .any(|&b| matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F));
    if binary {
        "application/octet-stream"
    } else {
        "text/plain; charset=utf-8"
    }
}
