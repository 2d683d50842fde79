//! Unified analytics endpoint.
//!
//! GET /api/analytics?type=<report>                  - any registered report as JSON
//! GET /api/analytics?type=<report>&export=<kind>    - the range's data as CSV instead

use axum::extract::Query;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::info;

use super::export::{csv_response, parse_kind};
use super::params::ReportQuery;
use super::{load_orders, load_window_orders};
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::report_registry::REALTIME_REPORT;
use crate::state::AppState;

pub fn router() -> Router {
    Router::new().route("/api/analytics", get(analytics))
}

async fn analytics(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let report_type = query
        .report_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::MissingParameter("type"))?
        .to_string();
    if !state.reports.contains(&report_type) {
        return Err(ApiError::UnknownReport(report_type));
    }
    let export = query
        .export
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(parse_kind)
        .transpose()?;

    let loaded = if report_type == REALTIME_REPORT {
        load_window_orders(&state, &query).await?
    } else {
        load_orders(&state, &query).await?
    };
    info!("Unified analytics request: type={} export={:?}", report_type, export);

    if let Some(kind) = export {
        return csv_response(&state, &loaded, kind);
    }

    let data = state.reports.run(&report_type, &loaded.input(&state))?;
    let message = loaded.describe(&format!("Report {}", report_type));
    Ok(Json(ApiResponse::new(data, message)).into_response())
}
