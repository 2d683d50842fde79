//! # Product Ranking
//!
//! Per-SKU aggregates over order line items, the top-seller and high-risk
//! rankings, keyword category classification and the month-over-month
//! category/product trend views.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::policy::{matches_any, AnalyticsPolicy};
use super::trend::growth_rate;
use super::{percentage, round_to};
use crate::models::{LineItem, Order};

// ============================================================================
// Data Types
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductAggregate {
    pub sku: String,
    pub name: String,
    pub category: String,
    /// Ordered quantity across all orders, cancelled ones included.
    pub quantity_sold: i64,
    pub gross_revenue: f64,
    pub order_lines: u64,
    pub completed_lines: u64,
    pub net_revenue: f64,
    pub cancelled_quantity: i64,
    pub cancelled_revenue: f64,
    pub cancelled_lines: u64,
    pub cancellation_rate: f64,
    pub success_rate: f64,
    pub avg_unit_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendLabel {
    Hot,
    Growing,
    Stable,
    Declining,
}

impl TrendLabel {
    pub fn from_growth(growth: f64) -> Self {
        if growth > 15.0 {
            Self::Hot
        } else if growth > 5.0 {
            Self::Growing
        } else if growth < -10.0 {
            Self::Declining
        } else {
            Self::Stable
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub revenue: f64,
    pub quantity: i64,
    pub lines: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPerformance {
    pub category: String,
    pub total_revenue: f64,
    pub total_quantity: i64,
    pub total_lines: u64,
    pub avg_monthly_revenue: f64,
    pub growth_rate: f64,
    pub trend: TrendLabel,
    pub monthly: Vec<MonthlyPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductTrend {
    pub sku: String,
    pub name: String,
    pub total_revenue: f64,
    pub total_quantity: i64,
    pub growth_rate: f64,
    pub trend: TrendLabel,
    pub monthly: Vec<MonthlyPoint>,
}

// ============================================================================
// Aggregation
// ============================================================================

/// Lines without a SKU are grouped by name; lines with neither are ignored.
fn line_key(item: &LineItem) -> Option<&str> {
    [item.sku.as_str(), item.name.as_str()]
        .into_iter()
        .find(|k| !k.is_empty())
}

pub fn classify_category<'a>(name: &str, policy: &'a AnalyticsPolicy) -> &'a str {
    policy
        .categories
        .iter()
        .find(|group| matches_any(name, &group.keywords))
        .map(|group| group.category.as_str())
        .unwrap_or(&policy.default_category)
}

/// Aggregate every order line per SKU, sorted by SKU.
pub fn build_products(orders: &[Order], policy: &AnalyticsPolicy) -> Vec<ProductAggregate> {
    let mut products: BTreeMap<String, ProductAggregate> = BTreeMap::new();

    for order in orders {
        let cancelled = order.status.is_cancelled();
        let completed = order.status.is_complete();

        for item in &order.items {
            let Some(key) = line_key(item) else { continue };
            let product = products.entry(key.to_string()).or_insert_with(|| ProductAggregate {
                sku: key.to_string(),
                name: item.name.clone(),
                category: classify_category(&item.name, policy).to_string(),
                ..Default::default()
            });

            product.order_lines += 1;
            product.quantity_sold += item.quantity;
            product.gross_revenue += item.row_total;
            if completed {
                product.completed_lines += 1;
                product.net_revenue += item.row_total;
            }
            if cancelled {
                product.cancelled_lines += 1;
                product.cancelled_quantity += item.quantity;
                product.cancelled_revenue += item.row_total;
            }
        }
    }

    products
        .into_values()
        .map(|mut product| {
            product.cancellation_rate = cancellation_rate(product.cancelled_quantity, product.quantity_sold);
            product.success_rate = percentage(product.completed_lines as f64, product.order_lines as f64);
            product.avg_unit_price = if product.quantity_sold > 0 {
                round_to(product.gross_revenue / product.quantity_sold as f64, 2)
            } else {
                0.0
            };
            product
        })
        .collect()
}

/// Cancelled share of the ordered quantity, in percent. No quantity, no rate.
pub fn cancellation_rate(cancelled_quantity: i64, total_quantity: i64) -> f64 {
    if total_quantity <= 0 {
        return 0.0;
    }
    percentage(cancelled_quantity as f64, total_quantity as f64)
}

pub fn find_product<'a>(products: &'a [ProductAggregate], sku: &str) -> Option<&'a ProductAggregate> {
    products.iter().find(|p| p.sku == sku)
}

/// Highest net revenue first; ties by SKU.
pub fn top_sellers(products: &[ProductAggregate], limit: usize) -> Vec<ProductAggregate> {
    let mut ranked = products.to_vec();
    ranked.sort_by(|a, b| {
        b.net_revenue
            .total_cmp(&a.net_revenue)
            .then_with(|| b.gross_revenue.total_cmp(&a.gross_revenue))
            .then_with(|| a.sku.cmp(&b.sku))
    });
    ranked.truncate(limit);
    ranked
}

/// Products whose cancellation rate is strictly above `threshold`, worst first.
pub fn high_risk(products: &[ProductAggregate], threshold: f64, limit: usize) -> Vec<ProductAggregate> {
    let mut risky: Vec<ProductAggregate> = products
        .iter()
        .filter(|p| p.cancellation_rate > threshold)
        .cloned()
        .collect();
    risky.sort_by(|a, b| {
        b.cancellation_rate
            .total_cmp(&a.cancellation_rate)
            .then_with(|| a.sku.cmp(&b.sku))
    });
    risky.truncate(limit);
    risky
}

// ============================================================================
// Trends
// ============================================================================

fn record_month(series: &mut BTreeMap<String, MonthlyPoint>, month: &str, item: &LineItem) {
    let point = series.entry(month.to_string()).or_insert_with(|| MonthlyPoint {
        month: month.to_string(),
        ..Default::default()
    });
    point.revenue += item.row_total;
    point.quantity += item.quantity;
    point.lines += 1;
}

fn month_key(order: &Order) -> Option<String> {
    order.day().map(|d| d.format("%Y-%m").to_string())
}

/// Monthly revenue per category with first-vs-last month growth, largest
/// category first.
pub fn category_performance(orders: &[Order], policy: &AnalyticsPolicy) -> Vec<CategoryPerformance> {
    let mut categories: HashMap<&str, BTreeMap<String, MonthlyPoint>> = HashMap::new();

    for order in orders {
        let Some(month) = month_key(order) else { continue };
        for item in &order.items {
            let category = classify_category(&item.name, policy);
            record_month(categories.entry(category).or_default(), &month, item);
        }
    }

    let mut performance: Vec<CategoryPerformance> = categories
        .into_iter()
        .map(|(category, series)| {
            let monthly: Vec<MonthlyPoint> = series.into_values().collect();
            let revenues: Vec<f64> = monthly.iter().map(|m| m.revenue).collect();
            let total_revenue: f64 = revenues.iter().sum();
            let growth = growth_rate(&revenues);
            CategoryPerformance {
                category: category.to_string(),
                total_revenue,
                total_quantity: monthly.iter().map(|m| m.quantity).sum(),
                total_lines: monthly.iter().map(|m| m.lines).sum(),
                avg_monthly_revenue: if monthly.is_empty() {
                    0.0
                } else {
                    (total_revenue / monthly.len() as f64).round()
                },
                growth_rate: growth,
                trend: TrendLabel::from_growth(growth),
                monthly,
            }
        })
        .collect();

    performance.sort_by(|a, b| {
        b.total_revenue
            .total_cmp(&a.total_revenue)
            .then_with(|| a.category.cmp(&b.category))
    });
    performance
}

/// Monthly revenue per SKU, fastest growing first.
pub fn product_trends(orders: &[Order]) -> Vec<ProductTrend> {
    let mut products: BTreeMap<String, (String, BTreeMap<String, MonthlyPoint>)> = BTreeMap::new();

    for order in orders {
        let Some(month) = month_key(order) else { continue };
        for item in &order.items {
            let Some(key) = line_key(item) else { continue };
            let (_, series) = products
                .entry(key.to_string())
                .or_insert_with(|| (item.name.clone(), BTreeMap::new()));
            record_month(series, &month, item);
        }
    }

    let mut trends: Vec<ProductTrend> = products
        .into_iter()
        .map(|(sku, (name, series))| {
            let monthly: Vec<MonthlyPoint> = series.into_values().collect();
            let revenues: Vec<f64> = monthly.iter().map(|m| m.revenue).collect();
            let growth = growth_rate(&revenues);
            ProductTrend {
                sku,
                name,
                total_revenue: revenues.iter().sum(),
                total_quantity: monthly.iter().map(|m| m.quantity).sum(),
                growth_rate: growth,
                trend: TrendLabel::from_growth(growth),
                monthly,
            }
        })
        .collect();

    trends.sort_by(|a, b| b.growth_rate.total_cmp(&a.growth_rate).then_with(|| a.sku.cmp(&b.sku)));
    trends
}
