//! Content categories recognised by the transcoder.

/// MIME type of every transcoded output.
pub const MIME_WEBP: &str = "image/webp";
/// GIF MIME type.
pub const MIME_GIF: &str = "image/gif";
/// SVG MIME type.
pub const MIME_SVG: &str = "image/svg+xml";
/// JPEG MIME type.
pub const MIME_JPEG: &str = "image/jpeg";
/// PNG MIME type.
pub const MIME_PNG: &str = "image/png";
/// BMP MIME type.
pub const MIME_BMP: &str = "image/bmp";
/// Photoshop document MIME type.
pub const MIME_PSD: &str = "image/vnd.adobe.photoshop";
/// Placeholder used when the original type was never recorded.
pub const MIME_UNKNOWN: &str = "unknown";

/// Still-image formats decoded and re-encoded to WebP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    /// JPEG.
    Jpeg,
    /// PNG.
    Png,
    /// Windows bitmap.
    Bmp,
    /// Static (non-animated) WebP.
    Webp,
    /// Photoshop document, flattened.
    Psd,
}

impl RasterFormat {
    /// Returns the MIME type for this format.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => MIME_JPEG,
            Self::Png => MIME_PNG,
            Self::Bmp => MIME_BMP,
            Self::Webp => MIME_WEBP,
            Self::Psd => MIME_PSD,
        }
    }
}

/// Classification of an input payload, decided once per request from its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageKind {
    /// GIF, possibly animated.
    Gif,
    /// WebP, animation not yet inspected.
    Webp,
    /// SVG document.
    Svg,
    /// Decodable still image.
    Raster(RasterFormat),
    /// Anything else, carrying the sniffed MIME type.
    Unsupported(String),
}

impl ImageKind {
    /// Returns the MIME type the payload was sniffed as.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        match self {
            Self::Gif => MIME_GIF,
            Self::Webp => MIME_WEBP,
            Self::Svg => MIME_SVG,
            Self::Raster(format) => format.mime_type(),
            Self::Unsupported(mime) => mime,
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mime_type())
    }
}
