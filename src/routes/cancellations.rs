//! Cancellation analysis route.
//!
//! GET /api/cancellations

use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Json, Router};

use super::load_orders;
use super::params::ReportQuery;
use crate::error::ApiError;
use crate::handlers::rollup::CancellationReport;
use crate::models::ApiResponse;
use crate::report_registry;
use crate::state::AppState;

pub fn router() -> Router {
    Router::new().route("/api/cancellations", get(cancellations))
}

async fn cancellations(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<CancellationReport>>, ApiError> {
    let loaded = load_orders(&state, &query).await?;
    let report = report_registry::cancellations(&loaded.input(&state));
    Ok(Json(ApiResponse::new(report, loaded.describe("Cancellations"))))
}
