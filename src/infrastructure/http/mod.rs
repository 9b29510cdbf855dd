//! Upstream HTTP client.

pub mod upstream_fetcher;

pub use upstream_fetcher::HttpUpstreamFetcher;
