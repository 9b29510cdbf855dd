//! Route configuration.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let csp = state.security.csp_layer();
    let report_to = state.security.report_to_layer();
    Router::new()
        .route(
            "/optimize/{dimensions}/{quality}/plain/{*url}",
            get(handlers::optimize),
        )
        .route("/optimize/plain/{*url}", get(handlers::optimize_legacy))
        .route("/health", get(handlers::health))
        .layer(csp)
        .layer(report_to)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::metadata_manager;
    use crate::application::services::transcoder::DEFAULT_MAX_DIMENSION;
    use crate::application::services::transcoder::mock::RecordingCodec;
    use crate::application::{
        MetadataManager, NegativeResultCache, ObjectCache, OptimizeImageUseCase, RewriteRules,
        Transcoder, UrlNormalizer,
    };
    use crate::domain::ProxyError;
    use crate::presentation::security::SecurityHeaders;
    use crate::domain::ports::mocks::{
        InMemoryMetadataRepository, InMemoryObjectStore, MockUpstreamFetcher,
    };
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use std::sync::Arc;
    use tower::ServiceExt;

    const URL: &str = "https://example.com/photo.jpg";
    const SVG_WITH_SCRIPT: &[u8] =
        b"<svg xmlns=\"http://www.w3.org/2000/svg\"><script>alert(1)</script></svg>";
    const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00original-bytes-of-a-photo";

    fn app(fetcher: &Arc<MockUpstreamFetcher>) -> Router {
        app_with_security(fetcher, SecurityHeaders::default())
    }

    fn app_with_security(
        fetcher: &Arc<MockUpstreamFetcher>,
        security: SecurityHeaders,
    ) -> Router {
        let metadata = Arc::new(MetadataManager::new(
            Arc::new(InMemoryMetadataRepository::new()),
            metadata_manager::DEFAULT_CAPACITY,
            metadata_manager::DEFAULT_TTL,
        ));
        let optimizer = Arc::new(OptimizeImageUseCase::new(
            fetcher.clone(),
            ObjectCache::new(Arc::new(InMemoryObjectStore::new())),
            metadata,
            Arc::new(Transcoder::new(
                Arc::new(RecordingCodec::sized(400, 300)),
                DEFAULT_MAX_DIMENSION,
            )),
            Arc::new(NegativeResultCache::default()),
        ));
        let normalizer = Arc::new(UrlNormalizer::new(RewriteRules::default(), 85).unwrap());
        create_router(AppState::new(optimizer, normalizer, security))
    }

    async fn get(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
        response.headers()[name].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_optimize_serves_webp_with_headers() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());
        fetcher.respond(URL, JPEG);
        let router = app(&fetcher);

        let uri = format!("/optimize/s:200:0/quality:85/plain/{URL}");
        let response = get(router.clone(), &uri).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "content-type"), "image/webp");
        assert_eq!(header_str(&response, "cache-control"), "max-age=604800");
        assert_eq!(header_str(&response, "x-optiproxy-original-mime"), "image/jpeg");
        assert_eq!(header_str(&response, "x-optiproxy-cache-hit"), "false");
        assert!(header_str(&response, "x-optiproxy-compression-ratio").ends_with(":1"));
        let length: usize = header_str(&response, "content-length").parse().unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), length);
        assert_eq!(&body[0..4], b"RIFF");

        let again = get(router, &uri).await;
        assert_eq!(header_str(&again, "x-optiproxy-cache-hit"), "true");
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_query_string_is_part_of_upstream_url() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());
        fetcher.respond("https://example.com/img.png?size=large&v=2", JPEG);

        let response = get(
            app(&fetcher),
            "/optimize/s:0:0/quality:85/plain/https://example.com/img.png?size=large&v=2",
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_escaped_redirect_target_is_served() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());
        fetcher.respond(URL, JPEG);

        let response = get(
            app(&fetcher),
            "/optimize/s:0:0/quality:85/plain/https%3A%2F%2Fexample.com%2Fphoto.jpg",
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webp_suffix_redirects_permanently() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());

        let response = get(
            app(&fetcher),
            "/optimize/s:200:0/quality:85/plain/https://example.com/photo.jpg@webp",
        )
        .await;

        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(
            header_str(&response, "location"),
            "/optimize/s:200:0/quality:85/plain/https%3A%2F%2Fexample.com%2Fphoto.jpg"
        );
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_legacy_route_redirects_with_default_quality() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());

        let response = get(app(&fetcher), &format!("/optimize/plain/{URL}")).await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            header_str(&response, "location"),
            "/optimize/s:0:0/quality:85/plain/https%3A%2F%2Fexample.com%2Fphoto.jpg"
        );
    }

    #[tokio::test]
    async fn test_malformed_dimensions_are_bad_request() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());

        let response = get(app(&fetcher), &format!("/optimize/s:abc/quality:85/plain/{URL}")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=240");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("s:width:height"));
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_remembered() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());
        fetcher.fail(URL, ProxyError::fetch(URL, "connection reset"));
        let router = app(&fetcher);
        let uri = format!("/optimize/s:0:0/quality:85/plain/{URL}");

        let first = get(router.clone(), &uri).await;
        let second = get(router, &uri).await;

        assert_eq!(first.status(), StatusCode::BAD_REQUEST);
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_health_reports_pipeline_state() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());

        let response = get(app(&fetcher), "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["in_flight"], 0);
        assert_eq!(json["negative_cache_entries"], 0);
        assert_eq!(json["metadata_cache"]["size"], 0);
    }

    #[tokio::test]
    async fn test_csp_is_sent_on_images_and_errors() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());
        fetcher.respond(URL, JPEG);
        let router = app(&fetcher);

        let ok = get(
            router.clone(),
            &format!("/optimize/s:0:0/quality:85/plain/{URL}"),
        )
        .await;
        let failed = get(
            router,
            "/optimize/s:0:0/quality:85/plain/https://example.com/gone.png",
        )
        .await;

        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(failed.status(), StatusCode::BAD_REQUEST);
        for response in [&ok, &failed] {
            assert_eq!(
                header_str(response, "content-security-policy"),
                "script-src 'none'"
            );
            assert!(!response.headers().contains_key("report-to"));
        }
    }

    #[tokio::test]
    async fn test_svg_passthrough_carries_csp() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());
        let svg_url = "https://example.com/logo.svg";
        fetcher.respond(svg_url, SVG_WITH_SCRIPT);

        let response = get(
            app(&fetcher),
            &format!("/optimize/s:0:0/quality:85/plain/{svg_url}"),
        )
        .await;

        assert_eq!(header_str(&response, "content-type"), "image/svg+xml");
        assert_eq!(
            header_str(&response, "content-security-policy"),
            "script-src 'none'"
        );
    }

    #[tokio::test]
    async fn test_configured_report_to_is_sent() {
        let fetcher = Arc::new(MockUpstreamFetcher::new());
        let security = SecurityHeaders::new(
            "script-src 'none'; report-to default",
            Some(r#"{"group":"default","max_age":31536000}"#),
        )
        .unwrap();

        let response = get(app_with_security(&fetcher, security), "/health").await;

        assert_eq!(
            header_str(&response, "content-security-policy"),
            "script-src 'none'; report-to default"
        );
        assert_eq!(
            header_str(&response, "report-to"),
            r#"{"group":"default","max_age":31536000}"#
        );
    }
}
