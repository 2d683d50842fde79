//! # Order Rollups
//!
//! Single-pass folds over an order list: per-day, per-week and per-month
//! buckets, the dashboard summary, the cancellation report and the
//! order-source classification. Nothing here can fail; malformed totals were
//! already coerced to zero when the orders were deserialized.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::policy::{matches_any, AnalyticsPolicy};
use super::trend::{series_stats, SeriesStats};
use super::percentage;
use crate::models::{DateRange, Order, OrderStatus};

// ============================================================================
// Data Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentChannel {
    CashOnDelivery,
    Online,
}

/// Counters accumulated for any set of orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderCounters {
    pub orders: u64,
    pub revenue: f64,
    pub pending_orders: u64,
    pub processing_orders: u64,
    pub complete_orders: u64,
    pub cancelled_orders: u64,
    pub cod_orders: u64,
    pub online_orders: u64,
    pub razorpay_orders: u64,
}

impl OrderCounters {
    pub fn record(&mut self, order: &Order, policy: &AnalyticsPolicy) {
        self.orders += 1;
        self.revenue += order.grand_total;

        match order.status {
            OrderStatus::Pending => self.pending_orders += 1,
            OrderStatus::Processing => self.processing_orders += 1,
            OrderStatus::Complete => self.complete_orders += 1,
            OrderStatus::Canceled | OrderStatus::Cancelled => self.cancelled_orders += 1,
            OrderStatus::Other(_) => {}
        }

        match payment_channel(order, policy) {
            PaymentChannel::CashOnDelivery => self.cod_orders += 1,
            PaymentChannel::Online => self.online_orders += 1,
        }
        if order
            .payment_method()
            .is_some_and(|m| matches_any(m, std::slice::from_ref(&policy.razorpay_keyword)))
        {
            self.razorpay_orders += 1;
        }
    }

    pub fn avg_order_value(&self) -> f64 {
        if self.orders == 0 {
            0.0
        } else {
            self.revenue / self.orders as f64
        }
    }

    pub fn cancellation_rate(&self) -> f64 {
        percentage(self.cancelled_orders as f64, self.orders as f64)
    }
}

/// One time bucket of a rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    pub period: String,
    #[serde(flatten)]
    pub counters: OrderCounters,
}

/// Rollup granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    /// ISO 8601 week, e.g. `2025-W09`.
    Week,
    Month,
}

impl Granularity {
    pub fn key(&self, day: NaiveDate) -> String {
        match self {
            Self::Day => day.format("%Y-%m-%d").to_string(),
            Self::Week => day.format("%G-W%V").to_string(),
            Self::Month => day.format("%Y-%m").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    #[serde(flatten)]
    pub totals: OrderCounters,
    pub avg_order_value: f64,
    pub cancellation_rate: f64,
    /// Orders whose timestamp could not be parsed; counted in totals, absent
    /// from every time bucket.
    pub undated_orders: u64,
    pub daily_stats: SeriesStats,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReasonCount {
    pub reason: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelledOrder {
    pub order_id: String,
    pub date: Option<String>,
    pub customer_email: Option<String>,
    pub amount: f64,
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationReport {
    pub total_orders: u64,
    pub total_cancelled: u64,
    pub cancellation_rate: f64,
    pub lost_revenue: f64,
    pub daily_trend: BTreeMap<String, u64>,
    pub top_reasons: Vec<ReasonCount>,
    pub cancelled_orders: Vec<CancelledOrder>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OrderClassification {
    pub total: u64,
    pub web: u64,
    pub call: u64,
    pub tele: u64,
    pub cod: u64,
    pub online: u64,
}

const NO_REASON: &str = "No reason provided";

// ============================================================================
// Classification Helpers
// ============================================================================

/// Orders without a payment method count as online.
pub fn payment_channel(order: &Order, policy: &AnalyticsPolicy) -> PaymentChannel {
    match order.payment_method() {
        Some(method) if matches_any(method, &policy.cod_keywords) => PaymentChannel::CashOnDelivery,
        _ => PaymentChannel::Online,
    }
}

/// Keep only orders dated within `range`. Undated orders are dropped.
pub fn filter_range(orders: Vec<Order>, range: &DateRange) -> Vec<Order> {
    let before = orders.len();
    let kept: Vec<Order> = orders
        .into_iter()
        .filter(|o| o.day().is_some_and(|d| range.contains(d)))
        .collect();
    if kept.len() != before {
        debug!(
            "Dropped {} orders outside {} to {}",
            before - kept.len(),
            range.start_date,
            range.end_date
        );
    }
    kept
}

// ============================================================================
// Rollups
// ============================================================================

/// Bucket orders by `granularity`, emitted in lexical (= chronological) key order.
pub fn rollup(orders: &[Order], granularity: Granularity, policy: &AnalyticsPolicy) -> Vec<PeriodBucket> {
    let mut buckets: BTreeMap<String, OrderCounters> = BTreeMap::new();
    for order in orders {
        let Some(day) = order.day() else { continue };
        buckets
            .entry(granularity.key(day))
            .or_default()
            .record(order, policy);
    }

    buckets
        .into_iter()
        .map(|(period, counters)| PeriodBucket { period, counters })
        .collect()
}

pub fn daily_rollup(orders: &[Order], policy: &AnalyticsPolicy) -> Vec<PeriodBucket> {
    rollup(orders, Granularity::Day, policy)
}

pub fn weekly_rollup(orders: &[Order], policy: &AnalyticsPolicy) -> Vec<PeriodBucket> {
    rollup(orders, Granularity::Week, policy)
}

pub fn monthly_rollup(orders: &[Order], policy: &AnalyticsPolicy) -> Vec<PeriodBucket> {
    rollup(orders, Granularity::Month, policy)
}

/// Headline dashboard numbers.
pub fn summarize(orders: &[Order], policy: &AnalyticsPolicy) -> DashboardSummary {
    let mut totals = OrderCounters::default();
    for order in orders {
        totals.record(order, policy);
    }

    let daily: Vec<f64> = daily_rollup(orders, policy)
        .iter()
        .map(|b| b.counters.revenue)
        .collect();
    let undated_orders = orders.iter().filter(|o| o.created_at.is_none()).count() as u64;

    DashboardSummary {
        avg_order_value: totals.avg_order_value(),
        cancellation_rate: totals.cancellation_rate(),
        totals,
        undated_orders,
        daily_stats: series_stats(&daily),
    }
}

pub fn cancellation_report(orders: &[Order]) -> CancellationReport {
    let mut lost_revenue = 0.0;
    let mut daily_trend: BTreeMap<String, u64> = BTreeMap::new();
    let mut reasons: HashMap<String, u64> = HashMap::new();
    let mut cancelled_orders = Vec::new();

    for order in orders.iter().filter(|o| o.status.is_cancelled()) {
        lost_revenue += order.grand_total;
        if let Some(day) = order.day() {
            *daily_trend.entry(Granularity::Day.key(day)).or_insert(0) += 1;
        }
        let reason = order.first_comment().unwrap_or(NO_REASON);
        *reasons.entry(reason.to_string()).or_insert(0) += 1;

        cancelled_orders.push(CancelledOrder {
            order_id: order.id.clone(),
            date: order.created_at.map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            customer_email: order.email().map(str::to_string),
            amount: order.grand_total,
            payment_method: order.payment_method().unwrap_or("N/A").to_string(),
        });
    }

    let mut top_reasons: Vec<ReasonCount> = reasons
        .into_iter()
        .map(|(reason, count)| ReasonCount { reason, count })
        .collect();
    top_reasons.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));

    let total_cancelled = cancelled_orders.len() as u64;
    CancellationReport {
        total_orders: orders.len() as u64,
        total_cancelled,
        cancellation_rate: percentage(total_cancelled as f64, orders.len() as f64),
        lost_revenue,
        daily_trend,
        top_reasons,
        cancelled_orders,
    }
}

/// Classify orders by sales source (shipping description keywords) and
/// payment channel.
pub fn classify_orders(orders: &[Order], policy: &AnalyticsPolicy) -> OrderClassification {
    let mut classification = OrderClassification::default();
    for order in orders {
        classification.total += 1;

        match payment_channel(order, policy) {
            PaymentChannel::CashOnDelivery => classification.cod += 1,
            PaymentChannel::Online => classification.online += 1,
        }

        let shipping = order.shipping_description.as_deref().unwrap_or_default();
        if matches_any(shipping, &policy.call_keywords) {
            classification.call += 1;
        } else if matches_any(shipping, &policy.tele_keywords) {
            classification.tele += 1;
        } else {
            classification.web += 1;
        }
    }
    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{order, order_with};
    use crate::models::Payment;

    fn fixture() -> Vec<Order> {
        vec![
            order("1", "2025-03-01 09:00:00", "complete", 1000.0),
            order("2", "2025-03-01 17:30:00", "pending", 250.5),
            order("3", "2025-03-02 11:00:00", "canceled", 400.0),
            order("4", "2025-03-03 08:15:00", "processing", 149.5),
            order("5", "2025-03-03 20:00:00", "cancelled", 100.0),
        ]
    }

    #[test]
    fn test_five_order_fixture_totals() {
        let policy = AnalyticsPolicy::default();
        let summary = summarize(&fixture(), &policy);

        assert_eq!(summary.totals.orders, 5);
        assert_eq!(summary.totals.revenue, 1900.0);
        assert_eq!(summary.totals.cancelled_orders, 2);
        assert_eq!(summary.totals.complete_orders, 1);
        assert_eq!(summary.totals.pending_orders, 1);
        assert_eq!(summary.totals.processing_orders, 1);
        assert_eq!(summary.avg_order_value, 380.0);
        assert_eq!(summary.cancellation_rate, 40.0);
        assert_eq!(summary.undated_orders, 0);
    }

    #[test]
    fn test_daily_rollup_partitions_revenue() {
        let policy = AnalyticsPolicy::default();
        let orders = fixture();
        let daily = daily_rollup(&orders, &policy);

        let keys: Vec<&str> = daily.iter().map(|b| b.period.as_str()).collect();
        assert_eq!(keys, vec!["2025-03-01", "2025-03-02", "2025-03-03"]);

        let bucket_total: f64 = daily.iter().map(|b| b.counters.revenue).sum();
        let order_total: f64 = orders.iter().map(|o| o.grand_total).sum();
        assert!((bucket_total - order_total).abs() < 1e-9);

        let bucket_orders: u64 = daily.iter().map(|b| b.counters.orders).sum();
        assert_eq!(bucket_orders, orders.len() as u64);
        assert_eq!(daily[0].counters.revenue, 1250.5);
    }

    #[test]
    fn test_nan_totals_degrade_to_zero() {
        let policy = AnalyticsPolicy::default();
        let orders: Vec<Order> = serde_json::from_value(serde_json::json!([
            {"entity_id": 1, "created_at": "2025-03-01 10:00:00", "status": "complete", "grand_total": "NaN"},
            {"entity_id": 2, "created_at": "2025-03-01 11:00:00", "status": "complete", "grand_total": "12.5"}
        ]))
        .unwrap();

        let summary = summarize(&orders, &policy);
        assert_eq!(summary.totals.revenue, 12.5);
        assert!(summary.daily_stats.mean.is_finite());
    }

    #[test]
    fn test_payment_channels() {
        let policy = AnalyticsPolicy::default();
        let mut orders = fixture();
        orders[0].payment = Some(Payment { method: Some("cashondelivery".into()) });
        orders[1].payment = Some(Payment { method: Some("PhonePe_COD".into()) });
        orders[2].payment = Some(Payment { method: Some("razorpay".into()) });

        let summary = summarize(&orders, &policy);
        assert_eq!(summary.totals.cod_orders, 2);
        assert_eq!(summary.totals.online_orders, 3);
        assert_eq!(summary.totals.razorpay_orders, 1);
    }

    #[test]
    fn test_weekly_and_monthly_keys() {
        let policy = AnalyticsPolicy::default();
        let orders = vec![
            order("1", "2024-12-30 10:00:00", "complete", 10.0),
            order("2", "2025-01-05 10:00:00", "complete", 20.0),
            order("3", "2025-01-06 10:00:00", "complete", 30.0),
        ];

        let weekly = weekly_rollup(&orders, &policy);
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].period, "2025-W01");
        assert_eq!(weekly[0].counters.revenue, 30.0);
        assert_eq!(weekly[1].period, "2025-W02");

        let monthly = monthly_rollup(&orders, &policy);
        let keys: Vec<&str> = monthly.iter().map(|b| b.period.as_str()).collect();
        assert_eq!(keys, vec!["2024-12", "2025-01"]);
    }

    #[test]
    fn test_undated_orders_skip_buckets() {
        let policy = AnalyticsPolicy::default();
        let mut orders = fixture();
        orders[0].created_at = None;

        let summary = summarize(&orders, &policy);
        assert_eq!(summary.undated_orders, 1);
        assert_eq!(summary.totals.orders, 5);
        let bucket_orders: u64 = daily_rollup(&orders, &policy)
            .iter()
            .map(|b| b.counters.orders)
            .sum();
        assert_eq!(bucket_orders, 4);
    }

    #[test]
    fn test_filter_range_is_inclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
        );
        let kept = filter_range(fixture(), &range);
        let ids: Vec<&str> = kept.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "4", "5"]);
    }

    #[test]
    fn test_cancellation_report() {
        let mut orders = fixture();
        orders[2] = order_with("3", "2025-03-02 11:00:00", "canceled", 400.0, |o| {
            o.status_histories = vec![crate::models::StatusHistory {
                comment: Some("Customer changed mind".into()),
            }];
        });

        let report = cancellation_report(&orders);
        assert_eq!(report.total_orders, 5);
        assert_eq!(report.total_cancelled, 2);
        assert_eq!(report.cancellation_rate, 40.0);
        assert_eq!(report.lost_revenue, 500.0);
        assert_eq!(report.daily_trend.get("2025-03-02"), Some(&1));
        assert_eq!(report.top_reasons.len(), 2);
        assert_eq!(report.top_reasons[0].reason, "Customer changed mind");
        assert_eq!(report.cancelled_orders[1].payment_method, "N/A");
    }

    #[test]
    fn test_empty_orders_yield_valid_summary() {
        let policy = AnalyticsPolicy::default();
        let summary = summarize(&[], &policy);
        assert_eq!(summary.totals.orders, 0);
        assert_eq!(summary.avg_order_value, 0.0);
        assert_eq!(summary.cancellation_rate, 0.0);

        let report = cancellation_report(&[]);
        assert_eq!(report.cancellation_rate, 0.0);
        assert!(report.top_reasons.is_empty());
    }

    #[test]
    fn test_classify_orders_by_source() {
        let policy = AnalyticsPolicy::default();
        let mut orders = fixture();
        orders[0].shipping_description = Some("Call Centre Dispatch".into());
        orders[1].shipping_description = Some("Telesales - Flat Rate".into());

        let classification = classify_orders(&orders, &policy);
        assert_eq!(classification.total, 5);
        assert_eq!(classification.call, 1);
        assert_eq!(classification.tele, 1);
        assert_eq!(classification.web, 3);
        assert_eq!(classification.online, 5);
    }
}
