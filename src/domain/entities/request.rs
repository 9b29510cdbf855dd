//! Logical request value objects and the keys derived from them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The semantic request: which upstream image, at what size and quality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalRequest {
    /// Upstream URL of the source image.
    pub source_url: String,
    /// Target width in pixels, 0 for aspect-derived.
    pub width: u32,
    /// Target height in pixels, 0 for aspect-derived.
    pub height: u32,
    /// Encoder quality.
    pub quality: u32,
}

impl LogicalRequest {
    /// Creates a new logical request.
    #[must_use]
    pub fn new(source_url: impl Into<String>, width: u32, height: u32, quality: u32) -> Self {
        Self {
            source_url: source_url.into(),
            width,
            height,
            quality,
        }
    }

    /// Returns the deterministic key used for coalescing and hashing.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey(format!(
            "{}-{}-{}-{}",
            self.source_url, self.width, self.height, self.quality
        ))
    }

    /// Returns the content address under which the optimized payload is stored.
    #[must_use]
    pub fn object_hash(&self) -> ObjectHash {
        self.cache_key().object_hash()
    }
}

/// Deterministic string form of a [`LogicalRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hashes the key into its object address.
    #[must_use]
    pub fn object_hash(&self) -> ObjectHash {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        ObjectHash(hex::encode(hasher.finalize()))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercase hex SHA-256 digest of a [`CacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHash(String);

impl ObjectHash {
    /// Length of a well-formed hash in hex characters.
    pub const LEN: usize = 64;

    /// Wraps a hash read back from a store without recomputing it.
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Parses a hash, rejecting anything that is not 64 lowercase hex characters.
    #[must_use]
    pub fn parse(hash: &str) -> Option<Self> {
        let valid = hash.len() == Self::LEN
            && hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hash.to_string()))
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first `len` characters, used to shard storage directories.
    #[must_use]
    pub fn prefix(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl std::fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
