//! HTTP mapping of pipeline errors.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::domain::ProxyError;

/// Short cache lifetime for failures so clients retry soon.
pub const ERROR_CACHE_CONTROL: &str = "max-age=240";

/// Returns the status code a pipeline error is answered with.
#[must_use]
pub const fn status_code(err: &ProxyError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }
        (
            status,
            [(header::CACHE_CONTROL, ERROR_CACHE_CONTROL)],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_bad_request() {
        let response = ProxyError::malformed("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            ERROR_CACHE_CONTROL
        );
    }

    #[test]
    fn test_read_errors_are_server_errors() {
        let err = ProxyError::MetadataRead {
            message: "locked".to_string(),
        };
        assert_eq!(status_code(&err), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            status_code(&ProxyError::internal("join")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
