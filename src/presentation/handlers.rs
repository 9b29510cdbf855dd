//! Request handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderName, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::debug;

use super::state::AppState;
use crate::application::services::CacheStats;
use crate::application::{Normalized, Redirect};
use crate::domain::{OptimizedImage, ProxyResult};

/// Cache lifetime of a successful response (one week).
pub const SUCCESS_CACHE_CONTROL: &str = "max-age=604800";

/// Bytes saved by optimization.
pub static SAVED_BYTES: HeaderName = HeaderName::from_static("x-optiproxy-saved-bytes");
/// Original to optimized size ratio.
pub static COMPRESSION_RATIO: HeaderName =
    HeaderName::from_static("x-optiproxy-compression-ratio");
/// MIME type of the source image.
pub static ORIGINAL_MIME: HeaderName = HeaderName::from_static("x-optiproxy-original-mime");
/// Whether the payload came from the object cache.
pub static CACHE_HIT: HeaderName = HeaderName::from_static("x-optiproxy-cache-hit");

/// `GET /optimize/{dimensions}/{quality}/plain/{*url}`
pub async fn optimize(
    State(state): State<AppState>,
    Path((dimensions, quality, url)): Path<(String, String, String)>,
    uri: Uri,
) -> ProxyResult<Response> {
    match state
        .normalizer
        .normalize(&dimensions, &quality, &url, raw_target(&uri))?
    {
        Normalized::Redirect(redirect) => Ok(redirect_response(&redirect)),
        Normalized::Proceed(request) => {
            let image = state.optimizer.execute(request).await?;
            Ok(image_response(image))
        }
    }
}

/// `GET /optimize/plain/{*url}`
pub async fn optimize_legacy(
    State(state): State<AppState>,
    Path(url): Path<String>,
    uri: Uri,
) -> Response {
    let redirect = state.normalizer.legacy_redirect(&url, raw_target(&uri));
    debug!(location = %redirect.location, "Redirecting legacy route");
    redirect_response(&redirect)
}

/// Health report.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the server answers.
    pub status: &'static str,
    /// Pipeline executions currently running.
    pub in_flight: usize,
    /// Failures currently remembered.
    pub negative_cache_entries: usize,
    /// Metadata LRU statistics.
    pub metadata_cache: CacheStats,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        in_flight: state.optimizer.in_flight_count(),
        negative_cache_entries: state.optimizer.negative_cache_len(),
        metadata_cache: state.optimizer.metadata_stats(),
    })
}

fn raw_target(uri: &Uri) -> &str {
    uri.path_and_query()
        .map_or_else(|| uri.path(), axum::http::uri::PathAndQuery::as_str)
}

fn redirect_response(redirect: &Redirect) -> Response {
    let status = if redirect.permanent {
        StatusCode::PERMANENT_REDIRECT
    } else {
        StatusCode::TEMPORARY_REDIRECT
    };
    (status, [(header::LOCATION, redirect.location.clone())]).into_response()
}

fn image_response(image: OptimizedImage) -> Response {
    let metadata = &image.metadata;
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, metadata.optimized_mime_type.clone()),
            (header::CONTENT_LENGTH, image.data.len().to_string()),
            (header::CACHE_CONTROL, SUCCESS_CACHE_CONTROL.to_string()),
            (SAVED_BYTES.clone(), metadata.saved_bytes().to_string()),
            (COMPRESSION_RATIO.clone(), metadata.compression_ratio_label()),
            (ORIGINAL_MIME.clone(), metadata.original_mime_type.clone()),
            (CACHE_HIT.clone(), image.cache_hit.to_string()),
        ],
        image.data,
    )
        .into_response()
}
