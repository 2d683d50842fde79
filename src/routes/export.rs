//! CSV export route.
//!
//! GET /api/export/{report} - `orders`, `customers`, `products` or `cancellations`

use axum::extract::{Path, Query};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use tracing::info;

use super::params::ReportQuery;
use super::{load_orders, LoadedOrders};
use crate::error::ApiError;
use crate::handlers::export::{cancellations_csv, customers_csv, orders_csv, products_csv, ExportKind};
use crate::handlers::products::build_products;
use crate::handlers::rollup::cancellation_report;
use crate::handlers::segmentation::build_customers;
use crate::state::AppState;

pub fn router() -> Router {
    Router::new().route("/api/export/{report}", get(export))
}

pub(crate) fn parse_kind(raw: &str) -> Result<ExportKind, ApiError> {
    ExportKind::parse(raw).ok_or_else(|| {
        ApiError::invalid(
            "export",
            format!("unknown export {:?}, expected orders, customers, products or cancellations", raw),
        )
    })
}

/// Render `kind` for the loaded orders as a CSV attachment.
pub(crate) fn csv_response(state: &AppState, loaded: &LoadedOrders, kind: ExportKind) -> Result<Response, ApiError> {
    let input = loaded.input(state);
    let body = match kind {
        ExportKind::Orders => orders_csv(input.orders)?,
        ExportKind::Customers => {
            customers_csv(&build_customers(input.orders, input.as_of, input.policy, input.options.segmentation))?
        }
        ExportKind::Products => products_csv(&build_products(input.orders, input.policy))?,
        ExportKind::Cancellations => cancellations_csv(&cancellation_report(input.orders).cancelled_orders)?,
    };

    let filename = kind.filename(&input.range);
    info!("Exporting {} ({} bytes)", filename, body.len());

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        body,
    )
        .into_response())
}

async fn export(
    Extension(state): Extension<AppState>,
    Path(report): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let kind = parse_kind(&report)?;
    let loaded = load_orders(&state, &query).await?;
    csv_response(&state, &loaded, kind)
}
