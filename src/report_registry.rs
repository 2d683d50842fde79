//! Report registry for the unified analytics endpoint.
//!
//! Each report is a plain function over a [`ReportInput`]; the dedicated
//! routes call those functions directly, and `GET /api/analytics?type=...`
//! looks them up by name here. Adding a report means writing the function
//! and one `register_report` line.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::handlers::policy::AnalyticsPolicy;
use crate::handlers::products::{
    build_products, category_performance, high_risk, product_trends, top_sellers, CategoryPerformance,
    ProductAggregate, ProductTrend,
};
use crate::handlers::realtime::{realtime_snapshot, RealtimeSnapshot, RealtimeWindow};
use crate::handlers::rollup::{
    cancellation_report, classify_orders, daily_rollup, monthly_rollup, summarize, weekly_rollup,
    CancellationReport, DashboardSummary, OrderClassification, PeriodBucket,
};
use crate::handlers::segmentation::{
    build_customers, segment_summary, CustomerAggregate, SegmentSummary, SegmentationChoice,
};
use crate::handlers::trend::{
    daily_series, forecast, forecast_insights, forecast_recommendations, growth_rate, linear_regression,
    seasonality, trend_insights, trend_recommendations, volatility, DailyPoint, Forecast, GapPolicy, Insight,
    Recommendation, Regression,
};
use crate::models::{DateRange, Order, OrderStatus};

/// Trending products listed by the trends report.
const TRENDING_PRODUCTS: usize = 20;

/// Registered name of the report that reads the `?interval=` window
/// rather than the date range.
pub const REALTIME_REPORT: &str = "realtime";

// ============================================================================
// Inputs
// ============================================================================

/// Per-request knobs, already validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    pub segmentation: SegmentationChoice,
    pub risk_threshold: f64,
    pub limit: Option<usize>,
    pub gaps: GapPolicy,
    pub horizon: usize,
    pub window: RealtimeWindow,
}

impl ReportOptions {
    pub fn from_policy(policy: &AnalyticsPolicy) -> Self {
        Self {
            segmentation: SegmentationChoice::from_policy(&policy.segmentation),
            risk_threshold: policy.high_risk_threshold,
            limit: None,
            gaps: GapPolicy::default(),
            horizon: 7,
            window: RealtimeWindow::default(),
        }
    }
}

pub struct ReportInput<'a> {
    /// Orders already restricted to `range`.
    pub orders: &'a [Order],
    pub range: DateRange,
    pub as_of: NaiveDateTime,
    pub policy: &'a AnalyticsPolicy,
    pub options: ReportOptions,
}

impl ReportInput<'_> {
    fn limit_or(&self, default: usize) -> usize {
        self.options.limit.unwrap_or(default)
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardReport {
    pub range: DateRange,
    pub summary: DashboardSummary,
    pub daily: Vec<PeriodBucket>,
}

#[derive(Debug, Serialize)]
pub struct CustomersReport {
    pub range: DateRange,
    pub as_of: NaiveDateTime,
    pub summary: SegmentSummary,
    pub customers: Vec<CustomerAggregate>,
}

#[derive(Debug, Serialize)]
pub struct ProductsReport {
    pub range: DateRange,
    pub total_products: usize,
    pub risk_threshold: f64,
    pub top_sellers: Vec<ProductAggregate>,
    pub high_risk: Vec<ProductAggregate>,
    pub categories: Vec<CategoryPerformance>,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: ProductAggregate,
    pub trend: Option<ProductTrend>,
}

#[derive(Debug, Serialize)]
pub struct TrendsReport {
    pub range: DateRange,
    pub daily: Vec<PeriodBucket>,
    pub weekly: Vec<PeriodBucket>,
    pub monthly: Vec<PeriodBucket>,
    pub regression: Regression,
    pub revenue_growth: f64,
    pub seasonality: f64,
    pub volatility: f64,
    pub categories: Vec<CategoryPerformance>,
    pub trending_products: Vec<ProductTrend>,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
pub struct ForecastReport {
    pub range: DateRange,
    pub fill_gaps: bool,
    pub series: Vec<DailyPoint>,
    /// Daily realized revenue.
    pub forecast: Forecast,
    /// Daily count of realized orders.
    pub orders_forecast: Forecast,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
}

pub fn dashboard(input: &ReportInput) -> DashboardReport {
    DashboardReport {
        range: input.range,
        summary: summarize(input.orders, input.policy),
        daily: daily_rollup(input.orders, input.policy),
    }
}

pub fn customers(input: &ReportInput) -> CustomersReport {
    let mut customers = build_customers(input.orders, input.as_of, input.policy, input.options.segmentation);
    let summary = segment_summary(&customers, input.policy, input.options.segmentation.strategy);
    if let Some(limit) = input.options.limit {
        customers.truncate(limit);
    }
    CustomersReport {
        range: input.range,
        as_of: input.as_of,
        summary,
        customers,
    }
}

pub fn products(input: &ReportInput) -> ProductsReport {
    let products = build_products(input.orders, input.policy);
    ProductsReport {
        range: input.range,
        total_products: products.len(),
        risk_threshold: input.options.risk_threshold,
        top_sellers: top_sellers(&products, input.limit_or(input.policy.top_sellers_limit)),
        high_risk: high_risk(&products, input.options.risk_threshold, input.policy.high_risk_limit),
        categories: category_performance(input.orders, input.policy),
    }
}

pub fn product_detail(input: &ReportInput, sku: &str) -> Option<ProductDetail> {
    let product = build_products(input.orders, input.policy)
        .into_iter()
        .find(|p| p.sku == sku)?;
    let trend = product_trends(input.orders).into_iter().find(|t| t.sku == sku);
    Some(ProductDetail { product, trend })
}

pub fn cancellations(input: &ReportInput) -> CancellationReport {
    let mut report = cancellation_report(input.orders);
    if let Some(limit) = input.options.limit {
        report.cancelled_orders.truncate(limit);
    }
    report
}

pub fn trends(input: &ReportInput) -> TrendsReport {
    let revenue: Vec<f64> = daily_series(input.orders, &input.range, input.options.gaps, |_| true)
        .iter()
        .map(|p| p.revenue)
        .collect();
    let monthly = monthly_rollup(input.orders, input.policy);
    let monthly_revenue: Vec<f64> = monthly.iter().map(|b| b.counters.revenue).collect();

    let mut trending = product_trends(input.orders);
    trending.truncate(input.limit_or(TRENDING_PRODUCTS));

    let revenue_growth = growth_rate(&monthly_revenue);
    let categories = category_performance(input.orders, input.policy);
    let insights = trend_insights(revenue_growth, &categories, &input.policy.insights);

    TrendsReport {
        range: input.range,
        daily: daily_rollup(input.orders, input.policy),
        weekly: weekly_rollup(input.orders, input.policy),
        regression: linear_regression(&revenue),
        revenue_growth,
        seasonality: seasonality(&monthly_revenue),
        volatility: volatility(&revenue),
        monthly,
        categories,
        trending_products: trending,
        recommendations: trend_recommendations(&insights),
        insights,
    }
}

/// Realized revenue only: complete and processing orders.
fn counts_toward_forecast(order: &Order) -> bool {
    matches!(order.status, OrderStatus::Complete | OrderStatus::Processing)
}

pub fn forecast_report(input: &ReportInput) -> ForecastReport {
    let series = daily_series(input.orders, &input.range, input.options.gaps, counts_toward_forecast);
    let revenue: Vec<f64> = series.iter().map(|p| p.revenue).collect();
    let orders: Vec<f64> = series.iter().map(|p| p.orders as f64).collect();
    let last_date = series.last().map(|p| p.date);

    let revenue_forecast = forecast(&revenue, input.options.horizon, last_date);
    let orders_forecast = forecast(&orders, input.options.horizon, last_date);
    let insights = forecast_insights(
        revenue_forecast.projected_growth,
        orders_forecast.projected_growth,
        seasonality(&revenue),
        &input.policy.insights,
    );

    ForecastReport {
        range: input.range,
        fill_gaps: input.options.gaps == GapPolicy::ZeroFill,
        forecast: revenue_forecast,
        orders_forecast,
        recommendations: forecast_recommendations(&insights),
        insights,
        series,
    }
}

pub fn realtime(input: &ReportInput) -> RealtimeSnapshot {
    realtime_snapshot(input.orders, input.as_of, input.options.window, &input.policy.realtime)
}

pub fn classification(input: &ReportInput) -> OrderClassification {
    classify_orders(input.orders, input.policy)
}

// ============================================================================
// ReportRegistry: name -> report function
// ============================================================================

type ReportFn = Box<dyn Fn(&ReportInput<'_>) -> Result<Value, ApiError> + Send + Sync>;

pub struct ReportRegistry {
    reports: BTreeMap<&'static str, ReportFn>,
}

impl Default for ReportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            reports: BTreeMap::new(),
        };
        registry.register_all();
        registry
    }

    /// Number of registered reports (for logging at startup).
    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    pub fn report_names(&self) -> Vec<&'static str> {
        self.reports.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.reports.contains_key(name)
    }

    pub fn run(&self, name: &str, input: &ReportInput) -> Result<Value, ApiError> {
        let report = self
            .reports
            .get(name)
            .ok_or_else(|| ApiError::UnknownReport(name.to_string()))?;
        report(input)
    }

    fn register_fn(&mut self, name: &'static str, f: ReportFn) {
        self.reports.insert(name, f);
    }

    fn register_report<T, F>(&mut self, name: &'static str, report: F)
    where
        T: Serialize,
        F: Fn(&ReportInput<'_>) -> T + Send + Sync + 'static,
    {
        self.register_fn(
            name,
            Box::new(move |input: &ReportInput<'_>| Ok(serde_json::to_value(report(input))?)),
        );
    }

    fn register_all(&mut self) {
        self.register_report("dashboard", dashboard);
        self.register_report("customers", customers);
        self.register_report("products", products);
        self.register_report("cancellations", cancellations);
        self.register_report("trends", trends);
        self.register_report("forecast", forecast_report);
        self.register_report("classification", classification);
        self.register_report(REALTIME_REPORT, realtime);
    }
}
