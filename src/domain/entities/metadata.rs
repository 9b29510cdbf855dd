//! Descriptive records about optimized objects.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::format::MIME_UNKNOWN;
use super::request::ObjectHash;

/// Descriptive record for one stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// URL the source image was fetched from.
    pub original_url: String,
    /// Address of the stored payload.
    pub object_hash: ObjectHash,
    /// Hex SHA-256 of the stored payload.
    pub checksum: String,
    /// Sniffed MIME type of the source image.
    pub original_mime_type: String,
    /// Size of the source image in bytes.
    pub original_size: u64,
    /// Size of the stored payload in bytes.
    pub optimized_size: u64,
    /// MIME type of the stored payload.
    pub optimized_mime_type: String,
}

impl ImageMetadata {
    /// Builds the record for a freshly produced payload.
    #[must_use]
    pub fn for_payload(
        original_url: impl Into<String>,
        object_hash: ObjectHash,
        payload: &[u8],
        original_mime_type: impl Into<String>,
        original_size: u64,
        optimized_mime_type: impl Into<String>,
    ) -> Self {
        Self {
            original_url: original_url.into(),
            object_hash,
            checksum: Self::checksum_of(payload),
            original_mime_type: original_mime_type.into(),
            original_size,
            optimized_size: payload.len() as u64,
            optimized_mime_type: optimized_mime_type.into(),
        }
    }

    /// Builds a stand-in record for a cached payload whose metadata row is gone.
    #[must_use]
    pub fn reconstructed(
        original_url: impl Into<String>,
        object_hash: ObjectHash,
        payload: &[u8],
        optimized_mime_type: impl Into<String>,
    ) -> Self {
        Self::for_payload(
            original_url,
            object_hash,
            payload,
            MIME_UNKNOWN,
            0,
            optimized_mime_type,
        )
    }

    /// Hex SHA-256 of a payload.
    #[must_use]
    pub fn checksum_of(payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hex::encode(hasher.finalize())
    }

    /// Bytes saved by optimization. Negative when the output grew.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn saved_bytes(&self) -> i64 {
        self.original_size as i64 - self.optimized_size as i64
    }

    /// Ratio of original to optimized size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compression_ratio(&self) -> f64 {
        if self.optimized_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.optimized_size as f64
    }

    /// Ratio formatted as `X.XX:1`.
    #[must_use]
    pub fn compression_ratio_label(&self) -> String {
        format!("{:.2}:1", self.compression_ratio())
    }
}

/// Result of the pipeline, shared by every coalesced caller.
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    /// Payload served to the client.
    pub data: Bytes,
    /// Metadata describing the payload.
    pub metadata: ImageMetadata,
    /// Whether the payload came from the object cache.
    pub cache_hit: bool,
}
