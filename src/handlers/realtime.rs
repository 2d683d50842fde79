//! # Realtime Snapshot
//!
//! Order activity over a short trailing window ending at `as_of`: headline
//! counters, the most recent orders, per-order alerts and a few
//! activity-level recommendations.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use super::policy::RealtimePolicy;
use super::trend::{Priority, Recommendation};
use super::{percentage, round_to};
use crate::models::{DateRange, Order};

/// Trailing window accepted by `?interval=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum RealtimeWindow {
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[default]
    #[serde(rename = "1hour")]
    OneHour,
    #[serde(rename = "4hours")]
    FourHours,
    #[serde(rename = "24hours")]
    OneDay,
}

impl RealtimeWindow {
    pub const ALL: [RealtimeWindow; 4] = [Self::FifteenMinutes, Self::OneHour, Self::FourHours, Self::OneDay];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|window| window.as_str() == raw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FifteenMinutes => "15min",
            Self::OneHour => "1hour",
            Self::FourHours => "4hours",
            Self::OneDay => "24hours",
        }
    }

    pub fn minutes(self) -> i64 {
        match self {
            Self::FifteenMinutes => 15,
            Self::OneHour => 60,
            Self::FourHours => 240,
            Self::OneDay => 1440,
        }
    }

    /// First instant of the window ending at `as_of`, clamped to the
    /// earliest representable timestamp.
    pub fn start(self, as_of: NaiveDateTime) -> NaiveDateTime {
        as_of
            .checked_sub_signed(Duration::minutes(self.minutes()))
            .unwrap_or(NaiveDateTime::MIN)
    }

    /// Calendar days the window touches, for fetching.
    pub fn date_range(self, as_of: NaiveDateTime) -> DateRange {
        DateRange::new(self.start(as_of).date(), as_of.date())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RealtimeMetrics {
    pub total_orders: u64,
    pub total_revenue: f64,
    pub completed_orders: u64,
    pub pending_orders: u64,
    pub cancelled_orders: u64,
    pub avg_order_value: f64,
    pub success_rate: f64,
    pub cancellation_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentOrder {
    pub order_id: String,
    pub customer: String,
    pub amount: f64,
    pub status: String,
    pub minutes_ago: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighValueOrder,
    OrderCancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub order_id: String,
    pub amount: f64,
    pub message: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeSnapshot {
    pub interval: RealtimeWindow,
    pub window_start: NaiveDateTime,
    pub window_end: NaiveDateTime,
    pub metrics: RealtimeMetrics,
    pub recent_activity: Vec<RecentOrder>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
}

fn display_id(order: &Order) -> String {
    order
        .increment_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .unwrap_or(&order.id)
        .to_string()
}

pub fn realtime_snapshot(
    orders: &[Order],
    as_of: NaiveDateTime,
    window: RealtimeWindow,
    rules: &RealtimePolicy,
) -> RealtimeSnapshot {
    let window_start = window.start(as_of);
    let in_window: Vec<(&Order, NaiveDateTime)> = orders
        .iter()
        .filter_map(|order| order.created_at.map(|ts| (order, ts)))
        .filter(|(_, ts)| *ts >= window_start && *ts <= as_of)
        .collect();

    let metrics = window_metrics(in_window.iter().map(|(order, _)| *order));

    let mut recent_activity: Vec<RecentOrder> = in_window
        .iter()
        .map(|(order, ts)| (*order, (as_of - *ts).num_minutes()))
        .filter(|(_, minutes_ago)| *minutes_ago <= rules.activity_minutes)
        .map(|(order, minutes_ago)| RecentOrder {
            order_id: display_id(order),
            customer: order.customer_email.clone().unwrap_or_else(|| "Guest".to_string()),
            amount: order.grand_total,
            status: order.status.as_str().to_string(),
            minutes_ago,
        })
        .collect();
    recent_activity.sort_by_key(|entry| entry.minutes_ago);
    recent_activity.truncate(rules.activity_limit);

    let alerts = in_window
        .iter()
        .flat_map(|(order, ts)| order_alerts(order, *ts, rules))
        .collect();

    RealtimeSnapshot {
        interval: window,
        window_start,
        window_end: as_of,
        recommendations: activity_recommendations(&metrics, rules),
        metrics,
        recent_activity,
        alerts,
    }
}

fn window_metrics<'a>(orders: impl Iterator<Item = &'a Order>) -> RealtimeMetrics {
    let mut metrics = RealtimeMetrics::default();
    for order in orders {
        metrics.total_orders += 1;
        metrics.total_revenue += order.grand_total;
        if order.status.is_complete() {
            metrics.completed_orders += 1;
        } else if order.status.is_cancelled() {
            metrics.cancelled_orders += 1;
        } else {
            metrics.pending_orders += 1;
        }
    }

    let total = metrics.total_orders as f64;
    metrics.total_revenue = round_to(metrics.total_revenue, 2);
    if metrics.total_orders > 0 {
        metrics.avg_order_value = round_to(metrics.total_revenue / total, 2);
    }
    metrics.success_rate = percentage(metrics.completed_orders as f64, total);
    metrics.cancellation_rate = percentage(metrics.cancelled_orders as f64, total);
    metrics
}

fn order_alerts(order: &Order, timestamp: NaiveDateTime, rules: &RealtimePolicy) -> Vec<Alert> {
    let order_id = display_id(order);
    let mut alerts = Vec::new();

    if order.grand_total > rules.high_value_threshold {
        alerts.push(Alert {
            kind: AlertKind::HighValueOrder,
            severity: AlertSeverity::Info,
            message: format!("High-value order received: {:.2}", order.grand_total),
            order_id: order_id.clone(),
            amount: order.grand_total,
            timestamp,
        });
    }
    if order.status.is_cancelled() {
        alerts.push(Alert {
            kind: AlertKind::OrderCancelled,
            severity: AlertSeverity::Warning,
            message: format!("Order {} was cancelled", order_id),
            order_id,
            amount: order.grand_total,
            timestamp,
        });
    }

    alerts
}

fn activity_recommendations(metrics: &RealtimeMetrics, rules: &RealtimePolicy) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if metrics.total_orders < rules.low_activity_orders {
        recommendations.push(Recommendation::new(
            "Low Activity",
            "Boost Marketing",
            "Consider running flash sales or targeted promotions",
            Priority::Medium,
        ));
    } else if metrics.total_orders > rules.high_activity_orders {
        recommendations.push(Recommendation::new(
            "High Activity",
            "Scale Resources",
            "Ensure adequate inventory and customer support capacity",
            Priority::High,
        ));
    }

    if metrics.cancellation_rate > rules.cancellation_alert_pct {
        recommendations.push(Recommendation::new(
            "High Cancellation Rate",
            "Reduce Cancellations",
            "Investigate order issues and improve the customer experience",
            Priority::Critical,
        ));
    }

    recommendations
}
