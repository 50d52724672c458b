//! CORS policy
//!
//! Preflight requests are answered by the layer itself and never reach
//! authentication or routing. The request origin is echoed only when it is
//! allow-listed; a `*` entry echoes any origin.

use axum::http::{header, HeaderValue, Method};
use fleet_core::ServerConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

pub fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if server.cors_allows_any() {
        return cors.allow_origin(AllowOrigin::mirror_request());
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn app(origins: &[&str]) -> Router {
        let server = ServerConfig {
            cors_origins: origins.iter().map(|o| o.to_string()).collect(),
            ..ServerConfig::default()
        };
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .layer(cors_layer(&server))
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/health")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_allow_listed_origin_echoed() {
        let response = app(&["https://dispatch.example.com"])
            .oneshot(preflight("https://dispatch.example.com"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://dispatch.example.com"
        );
    }

    #[tokio::test]
    async fn test_unknown_origin_not_echoed() {
        let response = app(&["https://dispatch.example.com"])
            .oneshot(preflight("https://evil.example.com"))
            .await
            .unwrap();

        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_wildcard_echoes_request_origin() {
        let response = app(&["*"])
            .oneshot(preflight("https://anywhere.example.com"))
            .await
            .unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://anywhere.example.com"
        );
    }
}
