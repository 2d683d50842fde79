//! Realtime activity route.
//!
//! GET /api/realtime?interval=15min|1hour|4hours|24hours - snapshot of the
//! trailing window ending at `as_of` (default: now, 1hour)

use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::info;

use super::load_window_orders;
use super::params::ReportQuery;
use crate::error::ApiError;
use crate::handlers::realtime::RealtimeSnapshot;
use crate::models::ApiResponse;
use crate::report_registry;
use crate::state::AppState;

pub fn router() -> Router {
    Router::new().route("/api/realtime", get(realtime))
}

async fn realtime(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<RealtimeSnapshot>>, ApiError> {
    let loaded = load_window_orders(&state, &query).await?;
    let snapshot = report_registry::realtime(&loaded.input(&state));
    if !snapshot.alerts.is_empty() {
        info!(
            "Realtime {}: {} alerts over {} orders",
            snapshot.interval.as_str(),
            snapshot.alerts.len(),
            snapshot.metrics.total_orders
        );
    }
    let message = format!(
        "Realtime {} window ending {} ({} orders)",
        snapshot.interval.as_str(),
        snapshot.window_end,
        snapshot.metrics.total_orders
    );
    Ok(Json(ApiResponse::new(snapshot, message)))
}
