//! Errors surfaced by the optimization pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

/// Pipeline error variants.
///
/// Cloneable so a single failure can be handed to every coalesced waiter and
/// kept in the negative result cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ProxyError {
    #[error("malformed request: {reason}")]
    MalformedInput { reason: String },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("received non 200 response code {status} for {url}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("image file is corrupted: {message}")]
    CorruptedImage { message: String },

    #[error("{mime} type is not supported")]
    UnsupportedFormat { mime: String },

    #[error("image ({width}x{height}) is too large, the limit is {limit} pixels per side")]
    ImageTooLarge { width: u32, height: u32, limit: u32 },

    #[error("transcoding failed: {message}")]
    Transcode { message: String },

    #[error("object cache read failed: {message}")]
    CacheRead { message: String },

    #[error("metadata read failed: {message}")]
    MetadataRead { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ProxyError {
    /// Creates malformed input error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }

    /// Creates fetch error.
    #[must_use]
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates corrupted image error.
    #[must_use]
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::CorruptedImage {
            message: message.into(),
        }
    }

    /// Creates unsupported format error.
    #[must_use]
    pub fn unsupported(mime: impl Into<String>) -> Self {
        Self::UnsupportedFormat { mime: mime.into() }
    }

    /// Creates transcode error.
    #[must_use]
    pub fn transcode(message: impl Into<String>) -> Self {
        Self::Transcode {
            message: message.into(),
        }
    }

    /// Creates internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns whether the failure is attributable to the request or its source.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput { .. }
                | Self::Fetch { .. }
                | Self::UpstreamStatus { .. }
                | Self::CorruptedImage { .. }
                | Self::UnsupportedFormat { .. }
                | Self::ImageTooLarge { .. }
                | Self::Transcode { .. }
        )
    }

    /// Returns whether the failure should suppress retries for a while.
    ///
    /// Only fetch and decode/transcode failures qualify.
    #[must_use]
    pub const fn is_negative_cacheable(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. }
                | Self::UpstreamStatus { .. }
                | Self::CorruptedImage { .. }
                | Self::UnsupportedFormat { .. }
                | Self::ImageTooLarge { .. }
                | Self::Transcode { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_is_not_negative_cached() {
        let err = ProxyError::malformed("bad dimensions");
        assert!(err.is_client_error());
        assert!(!err.is_negative_cacheable());
    }

    #[test]
    fn test_read_errors_are_server_side() {
        let err = ProxyError::CacheRead {
            message: "disk gone".to_string(),
        };
        assert!(!err.is_client_error());
        assert!(!err.is_negative_cacheable());
    }

    #[test]
    fn test_upstream_status_message() {
        let err = ProxyError::UpstreamStatus {
            url: "https://example.com/x.png".to_string(),
            status: 404,
        };
        assert!(err.is_negative_cacheable());
        assert_eq!(
            err.to_string(),
            "received non 200 response code 404 for https://example.com/x.png"
        );
    }
}
