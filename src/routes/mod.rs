//! HTTP route handlers.
//!
//! Probe routes carry `Cache-Control: no-store` so no intermediate cache can
//! answer for a process that has started shutting down.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod health;
pub mod index;

use axum::{middleware, routing::get, Router};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{CACHE_CONTROL_PROBE, HEALTH_PATH, LIVENESS_PATH, READINESS_PATH};
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Creates the Axum router with probe routes, the API index, and the JSON fallback.
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route(LIVENESS_PATH, get(health::live))
        .route(READINESS_PATH, get(health::ready))
        .route(HEALTH_PATH, get(health::health))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_PROBE),
        ));

    let api_routes = Router::new().route(&state.config.app.api_prefix, get(index::index));

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .fallback(index::not_found)
        .with_state(state)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
