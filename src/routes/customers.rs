//! Customer segmentation route.
//!
//! GET /api/customers?strategy=threshold|rfm_score&monetary=fixed|quintile&as_of=...

use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::info;

use super::load_orders;
use super::params::ReportQuery;
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::report_registry::{self, CustomersReport};
use crate::state::AppState;

pub fn router() -> Router {
    Router::new().route("/api/customers", get(customers))
}

async fn customers(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<CustomersReport>>, ApiError> {
    let loaded = load_orders(&state, &query).await?;
    let report = report_registry::customers(&loaded.input(&state));
    info!(
        "Segmented {} customers with {:?}",
        report.summary.total_customers, report.summary.strategy
    );
    Ok(Json(ApiResponse::new(report, loaded.describe("Customer segments"))))
}
