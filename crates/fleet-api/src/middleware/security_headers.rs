//! Security headers middleware
//!
//! Every response is JSON for an API client, so the set is small:
//! - X-Content-Type-Options: nosniff
//! - X-Frame-Options: DENY
//! - Referrer-Policy: no-referrer
//! - Cache-Control: no-store (responses carry tokens and personal data)
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Security headers middleware
///
/// Applied to every routed response, error envelopes included.
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // Prevent MIME type sniffing
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    // Disallow embedding in frames
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    // Never leak request URLs to other sites
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    // Keep tokens and personal data out of shared caches
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    response
}
