//! HTTP route modules.
//!
//! - `health`: liveness probe, outside basic auth
//! - `dashboard`: headline summary and order-source classification
//! - `customers`: customer segmentation
//! - `products`: product ranking and per-SKU detail
//! - `cancellations`: cancellation analysis
//! - `trends`: trend statistics and revenue forecast
//! - `realtime`: trailing-window activity snapshot (`?interval=`)
//! - `analytics`: unified `?type=` endpoint backed by the report registry
//! - `export`: CSV downloads
//!
//! Every report route follows the same shape: validate the query, fetch the
//! range's orders (failing open), run a pure report function, wrap the
//! result in [`ApiResponse`](crate::models::ApiResponse).

pub mod analytics;
pub mod auth;
pub mod cancellations;
pub mod customers;
pub mod dashboard;
pub mod export;
pub mod health;
pub mod params;
pub mod products;
pub mod realtime;
pub mod trends;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::clients::{fetch_or_empty, narrate_or_placeholder};
use crate::error::ApiError;
use crate::handlers::rollup::filter_range;
use crate::models::Order;
use crate::report_registry::ReportInput;
use crate::state::AppState;
use params::{ReportQuery, ReportRequest};

/// A validated request together with the orders of its range.
pub(crate) struct LoadedOrders {
    pub request: ReportRequest,
    pub orders: Vec<Order>,
}

impl LoadedOrders {
    pub fn input<'a>(&'a self, state: &'a AppState) -> ReportInput<'a> {
        ReportInput {
            orders: &self.orders,
            range: self.request.range,
            as_of: self.request.as_of,
            policy: &state.policy,
            options: self.request.options,
        }
    }

    pub fn describe(&self, what: &str) -> String {
        format!(
            "{} for {} to {} ({} orders)",
            what,
            self.request.range.start_date,
            self.request.range.end_date,
            self.orders.len()
        )
    }
}

pub(crate) async fn load_orders(state: &AppState, query: &ReportQuery) -> Result<LoadedOrders, ApiError> {
    let request = query.resolve(Utc::now().naive_utc(), &state.policy)?;
    Ok(fetch_for(state, request).await)
}

/// Like [`load_orders`], but over the calendar days of the `?interval=`
/// window ending at `as_of` instead of the requested date range.
pub(crate) async fn load_window_orders(state: &AppState, query: &ReportQuery) -> Result<LoadedOrders, ApiError> {
    let mut request = query.resolve(Utc::now().naive_utc(), &state.policy)?;
    request.range = request.options.window.date_range(request.as_of);
    Ok(fetch_for(state, request).await)
}

async fn fetch_for(state: &AppState, request: ReportRequest) -> LoadedOrders {
    let fetched = fetch_or_empty(state.orders.as_ref(), &request.range).await;
    let orders = filter_range(fetched, &request.range);
    LoadedOrders { request, orders }
}

/// A report with generated commentary alongside it.
#[derive(Debug, Serialize)]
pub struct Narrated<T: Serialize> {
    #[serde(flatten)]
    pub report: T,
    pub narrative: String,
}

pub(crate) async fn narrate<T: Serialize>(state: &AppState, prompt: &str, report: T) -> Result<Narrated<T>, ApiError> {
    let data: Value = serde_json::to_value(&report)?;
    let narrative = narrate_or_placeholder(state.narrator.as_ref(), prompt, &data).await;
    Ok(Narrated { report, narrative })
}
