//! # Customer Segmentation
//!
//! Groups orders by customer, derives recency/frequency/monetary metrics
//! against an explicit reference time and labels every customer with exactly
//! one segment. Two interchangeable schemes are supported (see
//! [`SegmentationStrategy`]); which one runs is the caller's choice, with the
//! policy supplying the default.
//!
//! Cancelled orders count towards `order_count` and the cancellation rate but
//! not towards frequency or monetary value.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::policy::{
    AnalyticsPolicy, CustomerKey, MonetaryScoring, ScoreCutoffs, SegmentationPolicy,
    SegmentationStrategy,
};
use super::percentage;
use crate::models::Order;

const GUEST: &str = "guest";

// ============================================================================
// Data Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RfmScores {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
}

impl RfmScores {
    pub fn total(&self) -> u8 {
        self.recency + self.frequency + self.monetary
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CustomerAggregate {
    pub customer_key: String,
    pub email: Option<String>,
    pub order_count: u32,
    pub cancelled_orders: u32,
    pub completed_orders: u32,
    pub completed_value: f64,
    pub total_spent: f64,
    pub first_order: Option<NaiveDateTime>,
    pub last_order: Option<NaiveDateTime>,
    /// Whole days from the last order to the reference time; `None` when no
    /// order carried a usable timestamp.
    pub recency_days: Option<i64>,
    pub frequency: u32,
    pub monetary: f64,
    pub lifetime_days: i64,
    pub avg_order_value: f64,
    pub cancellation_rate: f64,
    pub scores: Option<RfmScores>,
    pub segment: String,
}

/// Strategy selection for one segmentation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentationChoice {
    pub strategy: SegmentationStrategy,
    pub monetary: MonetaryScoring,
}

impl SegmentationChoice {
    pub fn from_policy(policy: &SegmentationPolicy) -> Self {
        Self {
            strategy: policy.strategy,
            monetary: policy.monetary_scoring,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SegmentCount {
    pub segment: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    pub strategy: SegmentationStrategy,
    pub total_customers: usize,
    pub segments: Vec<SegmentCount>,
    pub avg_customer_value: f64,
    pub avg_order_frequency: f64,
    pub top_buyers: Vec<CustomerAggregate>,
}

#[derive(Default)]
struct Accumulator {
    email: Option<String>,
    order_count: u32,
    cancelled_orders: u32,
    completed_orders: u32,
    completed_value: f64,
    total_spent: f64,
    first_order: Option<NaiveDateTime>,
    last_order: Option<NaiveDateTime>,
}

// ============================================================================
// Grouping
// ============================================================================

pub fn customer_key(order: &Order, key: CustomerKey) -> String {
    let (primary, secondary) = match key {
        CustomerKey::Email => (order.email(), order.numeric_customer_id()),
        CustomerKey::CustomerId => (order.numeric_customer_id(), order.email()),
    };
    primary.or(secondary).unwrap_or(GUEST).to_string()
}

/// Group `orders` per customer and label each customer.
///
/// `as_of` is the reference "now" for recency; it is never read from the clock
/// here. Output is sorted by monetary value, descending (ties by key).
pub fn build_customers(
    orders: &[Order],
    as_of: NaiveDateTime,
    policy: &AnalyticsPolicy,
    choice: SegmentationChoice,
) -> Vec<CustomerAggregate> {
    let mut groups: HashMap<String, Accumulator> = HashMap::new();

    for order in orders {
        let acc = groups.entry(customer_key(order, policy.customer_key)).or_default();
        if acc.email.is_none() {
            acc.email = order.email().map(str::to_string);
        }
        acc.order_count += 1;

        if order.status.is_cancelled() {
            acc.cancelled_orders += 1;
        } else {
            acc.total_spent += order.grand_total;
        }
        if order.status.is_complete() {
            acc.completed_orders += 1;
            acc.completed_value += order.grand_total;
        }

        if let Some(ts) = order.created_at {
            acc.first_order = Some(acc.first_order.map_or(ts, |first| first.min(ts)));
            acc.last_order = Some(acc.last_order.map_or(ts, |last| last.max(ts)));
        }
    }

    let mut customers: Vec<CustomerAggregate> = groups
        .into_iter()
        .map(|(key, acc)| finish(key, acc, as_of))
        .collect();

    label_all(&mut customers, &policy.segmentation, choice);

    customers.sort_by(|a, b| {
        b.monetary
            .total_cmp(&a.monetary)
            .then_with(|| a.customer_key.cmp(&b.customer_key))
    });
    customers
}

fn finish(customer_key: String, acc: Accumulator, as_of: NaiveDateTime) -> CustomerAggregate {
    let frequency = acc.order_count - acc.cancelled_orders;
    let recency_days = acc
        .last_order
        .map(|last| (as_of - last).num_days().max(0));
    let lifetime_days = match (acc.first_order, acc.last_order) {
        (Some(first), Some(last)) => (last - first).num_days() + 1,
        _ => 0,
    };
    let avg_order_value = if frequency > 0 {
        acc.total_spent / frequency as f64
    } else {
        0.0
    };

    CustomerAggregate {
        customer_key,
        email: acc.email,
        order_count: acc.order_count,
        cancelled_orders: acc.cancelled_orders,
        completed_orders: acc.completed_orders,
        completed_value: acc.completed_value,
        total_spent: acc.total_spent,
        first_order: acc.first_order,
        last_order: acc.last_order,
        recency_days,
        frequency,
        monetary: acc.total_spent,
        lifetime_days,
        avg_order_value,
        cancellation_rate: percentage(acc.cancelled_orders as f64, acc.order_count as f64),
        scores: None,
        segment: String::new(),
    }
}

// ============================================================================
// Labelling
// ============================================================================

fn label_all(customers: &mut [CustomerAggregate], policy: &SegmentationPolicy, choice: SegmentationChoice) {
    match choice.strategy {
        SegmentationStrategy::Threshold => {
            for customer in customers.iter_mut() {
                customer.segment = threshold_segment(customer, policy).to_string();
            }
        }
        SegmentationStrategy::RfmScore => {
            let mut sorted_monetary: Vec<f64> = customers.iter().map(|c| c.monetary).collect();
            sorted_monetary.sort_by(|a, b| a.total_cmp(b));

            for customer in customers.iter_mut() {
                let monetary = match choice.monetary {
                    MonetaryScoring::Fixed => monetary_score(customer.monetary, &policy.score_cutoffs),
                    MonetaryScoring::Quintile => quintile_score(customer.monetary, &sorted_monetary),
                };
                let scores = RfmScores {
                    recency: recency_score(customer.recency_days, &policy.score_cutoffs),
                    frequency: frequency_score(customer.frequency, &policy.score_cutoffs),
                    monetary,
                };
                customer.segment = score_segment(scores, policy).to_string();
                customer.scores = Some(scores);
            }
        }
    }
}

/// First matching threshold rule, else the fallback. Unknown recency never
/// satisfies an upper recency bound.
pub fn threshold_segment<'a>(customer: &CustomerAggregate, policy: &'a SegmentationPolicy) -> &'a str {
    let recency = customer.recency_days.unwrap_or(i64::MAX);
    policy
        .threshold_rules
        .iter()
        .find(|rule| rule.matches(customer.frequency, recency))
        .map(|rule| rule.label.as_str())
        .unwrap_or(&policy.threshold_fallback)
}

pub fn score_segment(scores: RfmScores, policy: &SegmentationPolicy) -> &str {
    policy
        .score_rules
        .iter()
        .find(|rule| rule.matches(scores.recency, scores.frequency, scores.monetary))
        .map(|rule| rule.label.as_str())
        .unwrap_or(&policy.score_fallback)
}

pub fn recency_score(recency_days: Option<i64>, cutoffs: &ScoreCutoffs) -> u8 {
    let Some(days) = recency_days else { return 1 };
    cutoffs
        .recency_days_below
        .iter()
        .position(|bound| days < *bound)
        .map_or(1, |i| 5 - i as u8)
}

pub fn frequency_score(frequency: u32, cutoffs: &ScoreCutoffs) -> u8 {
    cutoffs
        .frequency_at_least
        .iter()
        .position(|bound| frequency >= *bound)
        .map_or(1, |i| 5 - i as u8)
}

pub fn monetary_score(monetary: f64, cutoffs: &ScoreCutoffs) -> u8 {
    cutoffs
        .monetary_at_least
        .iter()
        .position(|bound| monetary >= *bound)
        .map_or(1, |i| 5 - i as u8)
}

/// `1 + floor(5 * strictly_lower / n)`, so tied customers share a score.
pub fn quintile_score(monetary: f64, sorted: &[f64]) -> u8 {
    if sorted.is_empty() {
        return 1;
    }
    let lower = sorted.partition_point(|v| *v < monetary);
    let score = 1 + (5 * lower) / sorted.len();
    score.clamp(1, 5) as u8
}

// ============================================================================
// Summary
// ============================================================================

/// Per-label counts (every label of the strategy present, zero-filled) plus
/// customer averages and the top buyers.
pub fn segment_summary(
    customers: &[CustomerAggregate],
    policy: &AnalyticsPolicy,
    strategy: SegmentationStrategy,
) -> SegmentSummary {
    let mut segments: Vec<SegmentCount> = policy
        .segmentation
        .labels(strategy)
        .into_iter()
        .map(|segment| SegmentCount { segment, count: 0 })
        .collect();

    for customer in customers {
        match segments.iter_mut().find(|s| s.segment == customer.segment) {
            Some(entry) => entry.count += 1,
            None => segments.push(SegmentCount {
                segment: customer.segment.clone(),
                count: 1,
            }),
        }
    }

    let total = customers.len();
    let (avg_customer_value, avg_order_frequency) = if total == 0 {
        (0.0, 0.0)
    } else {
        (
            customers.iter().map(|c| c.monetary).sum::<f64>() / total as f64,
            customers.iter().map(|c| c.frequency as f64).sum::<f64>() / total as f64,
        )
    };

    SegmentSummary {
        strategy,
        total_customers: total,
        segments,
        avg_customer_value,
        avg_order_frequency,
        top_buyers: customers.iter().take(policy.top_buyers_limit).cloned().collect(),
    }
}
