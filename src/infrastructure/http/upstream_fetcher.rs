//! HTTP client for downloading source images.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::domain::{ProxyError, ProxyResult, UpstreamFetcherPort};
use crate::infrastructure::config::FetchConfig;

/// Downloads upstream images with a browser-like identity.
///
/// A 502 from the origin is retried once after a short pause; every other
/// non-200 status is final.
pub struct HttpUpstreamFetcher {
    client: Client,
    retry_delay: Duration,
}

impl HttpUpstreamFetcher {
    /// Creates a fetcher from `config`.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(config: &FetchConfig) -> ProxyResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProxyError::internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn attempt(&self, url: &str) -> ProxyResult<Result<Bytes, StatusCode>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProxyError::fetch(url, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Ok(Err(status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::fetch(url, format!("failed to read body: {e}")))?;
        Ok(Ok(body))
    }
}

#[async_trait]
impl UpstreamFetcherPort for HttpUpstreamFetcher {
    async fn fetch(&self, url: &str) -> ProxyResult<Bytes> {
        debug!(url = %url, "Downloading source image");

        let mut outcome = self.attempt(url).await?;
        if outcome == Err(StatusCode::BAD_GATEWAY) {
            warn!(url = %url, "Origin returned 502, retrying once");
            tokio::time::sleep(self.retry_delay).await;
            outcome = self.attempt(url).await?;
        }

        outcome.map_err(|status| ProxyError::UpstreamStatus {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
