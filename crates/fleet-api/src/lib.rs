//! Fleet dispatch API
//!
//! HTTP backend for driver accounts, stop assignment and geocoding. Every
//! request passes CORS, tracing, security headers and bearer-token
//! resolution before the route table dispatches it behind its role gate.
//!
//! Author: hephaex@gmail.com

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod locks;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(feature = "test-utils")]
pub mod testing;

pub use error::{ApiError, AppError};
pub use state::AppState;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the complete application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = middleware::cors_layer(&state.config.server);

    routes::build(routes::route_table())
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
