//! Dashboard routes.
//!
//! GET /api/dashboard      - headline totals, daily buckets and commentary
//! GET /api/classification - order counts by sales source and payment channel

use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::info;

use super::params::ReportQuery;
use super::{load_orders, narrate, Narrated};
use crate::error::ApiError;
use crate::handlers::rollup::OrderClassification;
use crate::models::ApiResponse;
use crate::report_registry::{self, DashboardReport};
use crate::state::AppState;

const DASHBOARD_PROMPT: &str = "You are a business analyst for an online dental supply store. \
In three short bullet points, summarize revenue, order volume, payment mix and cancellations \
for the period below.";

pub fn router() -> Router {
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .route("/api/classification", get(classification))
}

async fn dashboard(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<Narrated<DashboardReport>>>, ApiError> {
    let loaded = load_orders(&state, &query).await?;
    let report = report_registry::dashboard(&loaded.input(&state));
    info!(
        "Dashboard: {} orders, revenue {:.2}",
        report.summary.totals.orders, report.summary.totals.revenue
    );

    let narrated = narrate(&state, DASHBOARD_PROMPT, report).await?;
    Ok(Json(ApiResponse::new(narrated, loaded.describe("Dashboard"))))
}

async fn classification(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<OrderClassification>>, ApiError> {
    let loaded = load_orders(&state, &query).await?;
    let report = report_registry::classification(&loaded.input(&state));
    Ok(Json(ApiResponse::new(report, loaded.describe("Order classification"))))
}
