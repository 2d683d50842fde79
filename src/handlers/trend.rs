//! # Trend Estimation
//!
//! Ordinary least squares over a daily revenue series plus the descriptive
//! statistics the forecast and trend views need.
//!
//! The regression runs against index position, not calendar date. With
//! [`GapPolicy::Skip`] days without orders are simply absent, so uneven
//! spacing compresses the time axis and biases the slope. That is the
//! long-standing dashboard behavior and stays the default;
//! [`GapPolicy::ZeroFill`] inserts explicit zero days instead.
//!
//! The insight rules at the bottom turn growth figures into labelled
//! observations and canned recommendations, thresholds from
//! [`InsightPolicy`].

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::policy::InsightPolicy;
use super::products::CategoryPerformance;
use super::round_to;
use crate::models::{DateRange, Order};

/// z-score for a two-sided 95% normal interval.
const Z_95: f64 = 1.96;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r2: f64,
}

impl Regression {
    pub fn predict(&self, index: f64) -> f64 {
        self.slope * index + self.intercept
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeriesStats {
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapPolicy {
    #[default]
    Skip,
    ZeroFill,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub revenue: f64,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub date: Option<NaiveDate>,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub regression: Regression,
    pub stats: SeriesStats,
    pub data_points: usize,
    pub next_prediction: f64,
    pub confidence_interval: ConfidenceInterval,
    pub projection: Vec<ProjectedPoint>,
    pub projected_total: f64,
    /// Last observed value to last projected value, in percent.
    pub projected_growth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// OLS fit of `values` against their index. Fewer than two points, or a
/// series whose x-spread is zero, yields the all-zero regression.
pub fn linear_regression(values: &[f64]) -> Regression {
    let n = values.len();
    if n < 2 {
        return Regression::default();
    }

    let n_f = n as f64;
    let sum_x: f64 = (0..n).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..n).map(|i| (i * i) as f64).sum();

    let denominator = n_f * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return Regression::default();
    }

    let slope = (n_f * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n_f;

    let y_mean = sum_y / n_f;
    let ss_total: f64 = values.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_residual: f64 = values
        .iter()
        .enumerate()
        .map(|(i, y)| (y - (slope * i as f64 + intercept)).powi(2))
        .sum();

    // A flat series has no variance to explain.
    let r2 = if ss_total == 0.0 {
        0.0
    } else {
        (1.0 - ss_residual / ss_total).max(0.0)
    };

    Regression { slope, intercept, r2 }
}

/// Population mean, variance and standard deviation.
pub fn series_stats(values: &[f64]) -> SeriesStats {
    if values.is_empty() {
        return SeriesStats::default();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    SeriesStats {
        mean,
        variance,
        std_dev: variance.sqrt(),
    }
}

/// Fit the series and project `horizon` points past its end.
///
/// The interval is `prediction ± 1.96·σ` of the observed series: a normal
/// approximation for display, not a prediction interval of the fit.
/// Projected values are floored at zero.
pub fn forecast(values: &[f64], horizon: usize, last_date: Option<NaiveDate>) -> Forecast {
    let regression = linear_regression(values);
    let stats = series_stats(values);
    let margin = Z_95 * stats.std_dev;
    let next_index = values.len() as f64;

    let next_prediction = regression.predict(next_index);
    let projection: Vec<ProjectedPoint> = (0..horizon)
        .map(|step| {
            let value = regression.predict(next_index + step as f64).max(0.0);
            ProjectedPoint {
                date: last_date.and_then(|d| d.checked_add_signed(Duration::days(step as i64 + 1))),
                value: round_to(value, 2),
                lower: round_to((value - margin).max(0.0), 2),
                upper: round_to(value + margin, 2),
            }
        })
        .collect();
    let projected_total = projection.iter().map(|p| p.value).sum();
    let projected_growth = match (values.last(), projection.last()) {
        (Some(observed), Some(projected)) => growth_rate(&[*observed, projected.value]),
        _ => 0.0,
    };

    Forecast {
        regression,
        stats,
        data_points: values.len(),
        next_prediction,
        confidence_interval: ConfidenceInterval {
            lower: next_prediction - margin,
            upper: next_prediction + margin,
        },
        projection,
        projected_total,
        projected_growth,
    }
}

/// Chronological per-day revenue/order series for the orders accepted by
/// `include`.
pub fn daily_series<F>(orders: &[Order], range: &DateRange, gaps: GapPolicy, include: F) -> Vec<DailyPoint>
where
    F: Fn(&Order) -> bool,
{
    let mut days: BTreeMap<NaiveDate, (f64, u64)> = BTreeMap::new();
    if gaps == GapPolicy::ZeroFill {
        for day in range.days() {
            days.insert(day, (0.0, 0));
        }
    }

    for order in orders.iter().filter(|o| include(o)) {
        let Some(day) = order.day() else { continue };
        if gaps == GapPolicy::ZeroFill && !range.contains(day) {
            continue;
        }
        let entry = days.entry(day).or_insert((0.0, 0));
        entry.0 += order.grand_total;
        entry.1 += 1;
    }

    days.into_iter()
        .map(|(date, (revenue, orders))| DailyPoint { date, revenue, orders })
        .collect()
}

/// First-to-last growth in percent.
pub fn growth_rate(values: &[f64]) -> f64 {
    let (Some(first), Some(last)) = (values.first(), values.last()) else {
        return 0.0;
    };
    if values.len() < 2 {
        return 0.0;
    }
    if *first == 0.0 {
        return if *last > 0.0 { 100.0 } else { 0.0 };
    }
    round_to((last - first) / first * 100.0, 1)
}

/// Coefficient of variation over (at least four) periods, 0 otherwise.
pub fn seasonality(values: &[f64]) -> f64 {
    if values.len() < 4 {
        return 0.0;
    }
    let stats = series_stats(values);
    if stats.mean == 0.0 {
        return 0.0;
    }
    round_to(stats.std_dev / stats.mean, 3)
}

/// Standard deviation of the series when it has at least two points.
pub fn volatility(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    series_stats(values).std_dev
}

// ============================================================================
// Insights
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InsightKind {
    #[serde(rename = "Strong Growth")]
    StrongGrowth,
    #[serde(rename = "Revenue Growth")]
    RevenueGrowth,
    #[serde(rename = "Revenue Decline")]
    RevenueDecline,
    #[serde(rename = "Category Leadership")]
    CategoryLeadership,
    #[serde(rename = "Order Volume")]
    OrderVolume,
    Seasonality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Impact {
    Positive,
    Negative,
    Informational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Confidence {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub message: String,
    pub impact: Impact,
    pub confidence: Confidence,
}

impl Insight {
    fn new(kind: InsightKind, impact: Impact, confidence: Confidence, message: String) -> Self {
        Self {
            kind,
            message,
            impact,
            confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub category: &'static str,
    pub action: &'static str,
    pub description: &'static str,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<&'static str>,
}

impl Recommendation {
    pub(crate) fn new(
        category: &'static str,
        action: &'static str,
        description: &'static str,
        priority: Priority,
    ) -> Self {
        Self {
            category,
            action,
            description,
            priority,
            timeline: None,
        }
    }

    fn within(mut self, timeline: &'static str) -> Self {
        self.timeline = Some(timeline);
        self
    }
}

/// Observations over historical growth and the category ranking
/// (`categories` largest first).
pub fn trend_insights(revenue_growth: f64, categories: &[CategoryPerformance], rules: &InsightPolicy) -> Vec<Insight> {
    let mut insights = Vec::new();

    if revenue_growth > rules.strong_growth_pct {
        insights.push(Insight::new(
            InsightKind::StrongGrowth,
            Impact::Positive,
            Confidence::High,
            format!(
                "Revenue grew {:.1}% over the period, indicating strong momentum",
                revenue_growth
            ),
        ));
    } else if revenue_growth < rules.decline_below_pct {
        insights.push(Insight::new(
            InsightKind::RevenueDecline,
            Impact::Negative,
            Confidence::High,
            format!(
                "Revenue declined {:.1}% over the period and needs immediate attention",
                revenue_growth.abs()
            ),
        ));
    }

    if let Some(top) = categories.first() {
        insights.push(Insight::new(
            InsightKind::CategoryLeadership,
            Impact::Positive,
            Confidence::Medium,
            format!(
                "{} is the strongest category with {:.1}% growth",
                top.category, top.growth_rate
            ),
        ));
    }

    insights
}

pub fn trend_recommendations(insights: &[Insight]) -> Vec<Recommendation> {
    insights
        .iter()
        .filter_map(|insight| match insight.kind {
            InsightKind::StrongGrowth => Some(Recommendation::new(
                "Growth Strategy",
                "Scale Successful Initiatives",
                "Identify and replicate the strategies driving current growth",
                Priority::High,
            )),
            InsightKind::RevenueDecline => Some(Recommendation::new(
                "Recovery Plan",
                "Implement Turnaround Strategy",
                "Focus on customer retention, new customer acquisition and product optimization",
                Priority::Critical,
            )),
            _ => None,
        })
        .collect()
}

/// Observations over the projected revenue and order growth and the
/// variability of the observed daily revenue.
pub fn forecast_insights(
    revenue_growth: f64,
    order_growth: f64,
    daily_variation: f64,
    rules: &InsightPolicy,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    if revenue_growth > rules.strong_growth_pct {
        insights.push(Insight::new(
            InsightKind::RevenueGrowth,
            Impact::Positive,
            Confidence::High,
            format!(
                "Revenue is projected to grow {:.1}% over the forecast horizon",
                revenue_growth
            ),
        ));
    } else if revenue_growth < rules.decline_below_pct {
        insights.push(Insight::new(
            InsightKind::RevenueDecline,
            Impact::Negative,
            Confidence::Medium,
            format!(
                "Revenue is projected to decline {:.1}%; intervention needed",
                revenue_growth.abs()
            ),
        ));
    }

    if order_growth > rules.order_surge_pct {
        insights.push(Insight::new(
            InsightKind::OrderVolume,
            Impact::Positive,
            Confidence::Medium,
            format!(
                "Order volume is projected to rise {:.1}%; prepare for higher demand",
                order_growth
            ),
        ));
    }

    if daily_variation > rules.seasonality_cv {
        insights.push(Insight::new(
            InsightKind::Seasonality,
            Impact::Informational,
            Confidence::Medium,
            format!(
                "Daily revenue varies by {:.0}% around its mean; plan inventory and marketing for the swings",
                daily_variation * 100.0
            ),
        ));
    }

    insights
}

pub fn forecast_recommendations(insights: &[Insight]) -> Vec<Recommendation> {
    insights
        .iter()
        .filter_map(|insight| match insight.kind {
            InsightKind::RevenueGrowth => Some(
                Recommendation::new(
                    "Growth Preparation",
                    "Scale Operations",
                    "Prepare inventory, staff and systems for increased demand",
                    Priority::High,
                )
                .within("2-4 weeks"),
            ),
            InsightKind::RevenueDecline => Some(
                Recommendation::new(
                    "Revenue Recovery",
                    "Implement Growth Strategies",
                    "Focus on customer acquisition, product promotion and retention",
                    Priority::Critical,
                )
                .within("1-2 weeks"),
            ),
            InsightKind::OrderVolume => Some(
                Recommendation::new(
                    "Capacity Planning",
                    "Optimize Fulfillment",
                    "Ensure adequate inventory and shipping capacity",
                    Priority::High,
                )
                .within("3-6 weeks"),
            ),
            _ => None,
        })
        .collect()
}
