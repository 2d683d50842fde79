//! Product routes.
//!
//! GET /api/products       - top sellers, high-risk products, category performance
//! GET /api/products/{sku} - one product's aggregate and monthly trend

use axum::extract::{Path, Query};
use axum::routing::get;
use axum::{Extension, Json, Router};

use super::load_orders;
use super::params::ReportQuery;
use crate::error::ApiError;
use crate::models::ApiResponse;
use crate::report_registry::{self, ProductDetail, ProductsReport};
use crate::state::AppState;

pub fn router() -> Router {
    Router::new()
        .route("/api/products", get(products))
        .route("/api/products/{sku}", get(product))
}

async fn products(
    Extension(state): Extension<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<ProductsReport>>, ApiError> {
    let loaded = load_orders(&state, &query).await?;
    let report = report_registry::products(&loaded.input(&state));
    Ok(Json(ApiResponse::new(report, loaded.describe("Product performance"))))
}

async fn product(
    Extension(state): Extension<AppState>,
    Path(sku): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<ProductDetail>>, ApiError> {
    let loaded = load_orders(&state, &query).await?;
    let detail = report_registry::product_detail(&loaded.input(&state), &sku)
        .ok_or_else(|| ApiError::not_found("product", &sku))?;
    Ok(Json(ApiResponse::new(detail, format!("Product {}", sku))))
}
