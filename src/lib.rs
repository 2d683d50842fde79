//! # Storefront Insights Library
//!
//! Exposes the Axum router and modules so integration tests can create
//! an in-process server with stub order sources and narrators.

pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod report_registry;
pub mod routes;
pub mod state;

use axum::middleware;
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the Axum router with all route modules and middleware.
///
/// Everything under `/api` sits behind basic auth when the state carries
/// credentials; `/health` never does. This function does NOT start a server.
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::dashboard::router())
        .merge(routes::customers::router())
        .merge(routes::products::router())
        .merge(routes::cancellations::router())
        .merge(routes::trends::router())
        .merge(routes::realtime::router())
        .merge(routes::analytics::router())
        .merge(routes::export::router())
        .route_layer(middleware::from_fn(routes::auth::require_basic_auth));

    Router::new()
        .merge(routes::health::router())
        .merge(api)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
