//! Security headers attached to every response.

use axum::http::header::{self, HeaderName, HeaderValue, InvalidHeaderValue};
use axum::response::Response;
use tower_http::set_header::SetResponseHeaderLayer;

/// Reporting endpoint groups referenced by the policy.
pub static REPORT_TO: HeaderName = HeaderName::from_static("report-to");

/// Validated header values.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    content_security_policy: HeaderValue,
    report_to: Option<HeaderValue>,
}

impl SecurityHeaders {
    /// Validates the configured values.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is not a valid header value.
    pub fn new(
        content_security_policy: &str,
        report_to: Option<&str>,
    ) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            content_security_policy: HeaderValue::from_str(content_security_policy)?,
            report_to: report_to.map(HeaderValue::from_str).transpose()?,
        })
    }

    /// Layer setting `Content-Security-Policy`.
    #[must_use]
    pub fn csp_layer(&self) -> SetResponseHeaderLayer<HeaderValue> {
        SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            self.content_security_policy.clone(),
        )
    }

    /// Layer setting `Report-To` when configured.
    #[must_use]
    pub fn report_to_layer(
        &self,
    ) -> SetResponseHeaderLayer<impl Fn(&Response) -> Option<HeaderValue> + Clone + use<>> {
        let value = self.report_to.clone();
        SetResponseHeaderLayer::overriding(REPORT_TO.clone(), move |_: &Response| value.clone())
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self {
            content_security_policy: HeaderValue::from_static("script-src 'none'"),
            report_to: None,
        }
    }
}
