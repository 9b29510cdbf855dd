//! Upstream fetch port definition.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::ProxyResult;

/// Port for downloading source images.
#[async_trait]
pub trait UpstreamFetcherPort: Send + Sync {
    /// Downloads the body at `url`. Any non-success outcome is an error.
    async fn fetch(&self, url: &str) -> ProxyResult<Bytes>;
}
