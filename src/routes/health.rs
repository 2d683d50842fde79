//! Liveness probe.
//!
//! GET /health - always 200, never authenticated

use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;

use crate::models::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub reports: Vec<&'static str>,
    pub auth_enabled: bool,
}

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health(Extension(state): Extension<AppState>) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::new(
        HealthStatus {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            reports: state.reports.report_names(),
            auth_enabled: state.auth.is_some(),
        },
        "Service is healthy",
    ))
}
