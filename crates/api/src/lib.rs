//! EasyCart API library.
//!
//! Multi-tenant storefront service: catalog, order placement with stock
//! reservation, and shop-owner order management. Exposed as a library so the
//! binary, the CLI and the integration tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod orders;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router with tracing, request IDs and Sentry layers.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(middleware::request_id::make_span))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
