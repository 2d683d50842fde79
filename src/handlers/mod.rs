//! Aggregation core for the storefront insights service.
//!
//! Every report the HTTP layer serves is a pure function over a list of
//! [`Order`](crate::models::Order)s plus an [`AnalyticsPolicy`](policy::AnalyticsPolicy):
//! - `rollup`: daily/weekly/monthly buckets, dashboard summary, cancellations
//! - `segmentation`: per-customer RFM metrics and segment labels
//! - `products`: per-SKU aggregates, risk ranking, categories and trends
//! - `trend`: regression, descriptive statistics, forecasting and rule-based insights
//! - `realtime`: trailing-window activity snapshot with alerts
//! - `export`: CSV renderings of the above
//!
//! Nothing in here performs I/O or reads the clock.

pub mod export;
pub mod policy;
pub mod products;
pub mod realtime;
pub mod rollup;
pub mod segmentation;
pub mod trend;

/// `part / whole` as a percentage rounded to one decimal, 0 for an empty whole.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    round_to(part / whole * 100.0, 1)
}

pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
