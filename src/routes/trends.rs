//! Trend and forecast routes.
//!
//! GET /api/trends   - period rollups, regression, growth, seasonality, category/product trends, insights
//! GET /api/forecast - revenue and order forecasts with a 95% interval (`?horizon=7&fill_gaps=true`)

use axum::extract::Query;
use axum::routing::get;
use axum::{Extension, Json, Router};
use tracing::info;

use super::params::ReportQuery;
use super::{load_orders, narrate, Narrated};
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::report_registry::{self, ForecastReport, TrendsReport};
use crate::state::AppState;

const TRENDS_PROMPT: &str = "You are a data analyst for an online dental supply store. \
Describe the most important revenue and product trends below in three short bullet points.";

const FORECAST_PROMPT: &str = "You are a data scientist for an online dental supply store. \
Given the daily revenue series and linear forecast below, explain the outlook and its \
reliability in three short bullet points.";

pub fn router() -> Router {
    Router::new()
        .route("/api/trends", get(trends))
        .route("/api/forecast", get(forecast))
}

async fn trends(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<Narrated<TrendsReport>>>, ApiError> {
    let loaded = load_orders(&state, &query).await?;
    let report = report_registry::trends(&loaded.input(&state));
    let narrated = narrate(&state, TRENDS_PROMPT, report).await?;
    Ok(Json(ApiResponse::new(narrated, loaded.describe("Trends"))))
}

async fn forecast(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<Narrated<ForecastReport>>>, ApiError> {
    let loaded = load_orders(&state, &query).await?;
    let report = report_registry::forecast_report(&loaded.input(&state));
    info!(
        "Forecast over {} points: slope {:.2}, r2 {:.3}",
        report.forecast.data_points, report.forecast.regression.slope, report.forecast.regression.r2
    );
    let narrated = narrate(&state, FORECAST_PROMPT, report).await?;
    Ok(Json(ApiResponse::new(narrated, loaded.describe("Forecast"))))
}
