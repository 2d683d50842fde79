//! # Analytics Policy
//!
//! Every threshold and keyword list used by the aggregation core lives here,
//! so the choice between competing segmentation schemes is an explicit,
//! inspectable configuration value rather than a branch buried in a handler.
//!
//! The defaults reproduce the dashboard's established behavior. A YAML file
//! can override any subset of fields:
//!
//! ```yaml
//! high_risk_threshold: 20.0
//! segmentation:
//!   threshold_rules:
//!     - label: VIP
//!       min_frequency: 8
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid policy document: {0}")]
    Parse(#[from] serde_yaml::Error),
}

// ============================================================================
// Segmentation Rules
// ============================================================================

/// Which customer segmentation scheme to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationStrategy {
    /// Priority-ordered frequency/recency rules.
    Threshold,
    /// R, F and M scored 1..5 and matched against a score rule table.
    RfmScore,
}

impl SegmentationStrategy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "threshold" => Some(Self::Threshold),
            "rfm_score" | "rfm" => Some(Self::RfmScore),
            _ => None,
        }
    }
}

/// How the monetary dimension is scored under [`SegmentationStrategy::RfmScore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonetaryScoring {
    /// Absolute currency thresholds.
    Fixed,
    /// Relative rank within the customers of the current request.
    Quintile,
}

impl MonetaryScoring {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fixed" => Some(Self::Fixed),
            "quintile" => Some(Self::Quintile),
            _ => None,
        }
    }
}

/// Bounds are inclusive; `None` leaves that side open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub label: String,
    #[serde(default)]
    pub min_frequency: Option<u32>,
    #[serde(default)]
    pub max_frequency: Option<u32>,
    #[serde(default)]
    pub min_recency_days: Option<i64>,
    #[serde(default)]
    pub max_recency_days: Option<i64>,
}

impl ThresholdRule {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            min_frequency: None,
            max_frequency: None,
            min_recency_days: None,
            max_recency_days: None,
        }
    }

    fn frequency(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_frequency = min;
        self.max_frequency = max;
        self
    }

    fn recency(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min_recency_days = min;
        self.max_recency_days = max;
        self
    }

    pub fn matches(&self, frequency: u32, recency_days: i64) -> bool {
        within(frequency, self.min_frequency, self.max_frequency)
            && within(recency_days, self.min_recency_days, self.max_recency_days)
    }
}

/// A rule over the three 1..5 scores and their sum. Bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRule {
    pub label: String,
    #[serde(default)]
    pub recency: ScoreBounds,
    #[serde(default)]
    pub frequency: ScoreBounds,
    #[serde(default)]
    pub monetary: ScoreBounds,
    #[serde(default)]
    pub min_total: Option<u8>,
    #[serde(default)]
    pub max_total: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBounds {
    #[serde(default)]
    pub min: Option<u8>,
    #[serde(default)]
    pub max: Option<u8>,
}

impl ScoreBounds {
    const ANY: Self = Self { min: None, max: None };

    fn between(min: u8, max: u8) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    fn at_least(min: u8) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    fn at_most(max: u8) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    fn exactly(value: u8) -> Self {
        Self::between(value, value)
    }

    fn contains(&self, score: u8) -> bool {
        within(score, self.min, self.max)
    }
}

impl ScoreRule {
    fn new(label: &str, recency: ScoreBounds, frequency: ScoreBounds, monetary: ScoreBounds) -> Self {
        Self {
            label: label.to_string(),
            recency,
            frequency,
            monetary,
            min_total: None,
            max_total: None,
        }
    }

    fn total(mut self, min: Option<u8>, max: Option<u8>) -> Self {
        self.min_total = min;
        self.max_total = max;
        self
    }

    pub fn matches(&self, r: u8, f: u8, m: u8) -> bool {
        self.recency.contains(r)
            && self.frequency.contains(f)
            && self.monetary.contains(m)
            && within(r + f + m, self.min_total, self.max_total)
    }
}

fn within<T: PartialOrd + Copy>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.map_or(true, |lo| value >= lo) && max.map_or(true, |hi| value <= hi)
}

/// Score cut-offs for one dimension: the first entry whose bound the value
/// satisfies yields `5 - index`; anything below every cut-off scores 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCutoffs {
    /// Recency upper bounds (exclusive) for scores 5, 4, 3, 2.
    pub recency_days_below: [i64; 4],
    /// Frequency lower bounds (inclusive) for scores 5, 4, 3, 2.
    pub frequency_at_least: [u32; 4],
    /// Monetary lower bounds (inclusive) for scores 5, 4, 3, 2.
    pub monetary_at_least: [f64; 4],
}

impl Default for ScoreCutoffs {
    fn default() -> Self {
        Self {
            recency_days_below: [30, 60, 90, 180],
            frequency_at_least: [10, 5, 3, 2],
            monetary_at_least: [100_000.0, 50_000.0, 20_000.0, 5_000.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationPolicy {
    pub strategy: SegmentationStrategy,
    pub monetary_scoring: MonetaryScoring,
    pub threshold_rules: Vec<ThresholdRule>,
    pub threshold_fallback: String,
    pub score_cutoffs: ScoreCutoffs,
    pub score_rules: Vec<ScoreRule>,
    pub score_fallback: String,
}

impl Default for SegmentationPolicy {
    fn default() -> Self {
        use ScoreBounds as B;

        Self {
            strategy: SegmentationStrategy::Threshold,
            monetary_scoring: MonetaryScoring::Fixed,
            threshold_rules: vec![
                ThresholdRule::new("Champions").frequency(Some(5), None).recency(None, Some(30)),
                ThresholdRule::new("Loyal").frequency(Some(3), None).recency(None, Some(60)),
                ThresholdRule::new("At Risk").frequency(Some(3), None).recency(Some(91), None),
                ThresholdRule::new("New").frequency(Some(1), Some(1)).recency(None, Some(30)),
            ],
            threshold_fallback: "Hibernating".to_string(),
            score_cutoffs: ScoreCutoffs::default(),
            score_rules: vec![
                ScoreRule::new("Champions", B::at_least(4), B::at_least(4), B::at_least(4)),
                ScoreRule::new("Cannot Lose Them", B::at_most(2), B::at_least(4), B::at_least(4)),
                ScoreRule::new("Loyal Customers", B::at_least(3), B::at_least(4), B::ANY),
                ScoreRule::new("At Risk", B::at_most(2), B::at_least(3), B::ANY),
                ScoreRule::new("Potential Loyalists", B::at_least(4), B::between(2, 3), B::ANY),
                ScoreRule::new("New Customers", B::exactly(5), B::exactly(1), B::ANY),
                ScoreRule::new("Promising", B::exactly(4), B::exactly(1), B::ANY),
                ScoreRule::new("Needs Attention", B::exactly(3), B::ANY, B::ANY).total(Some(8), None),
                ScoreRule::new("About to Sleep", B::exactly(3), B::ANY, B::ANY),
                ScoreRule::new("Lost", B::exactly(1), B::ANY, B::ANY).total(None, Some(4)),
            ],
            score_fallback: "Hibernating".to_string(),
        }
    }
}

impl SegmentationPolicy {
    /// Labels the given strategy can produce, in rule order, fallback last.
    pub fn labels(&self, strategy: SegmentationStrategy) -> Vec<String> {
        let (rules, fallback): (Vec<&str>, &str) = match strategy {
            SegmentationStrategy::Threshold => (
                self.threshold_rules.iter().map(|r| r.label.as_str()).collect(),
                self.threshold_fallback.as_str(),
            ),
            SegmentationStrategy::RfmScore => (
                self.score_rules.iter().map(|r| r.label.as_str()).collect(),
                self.score_fallback.as_str(),
            ),
        };

        let mut labels: Vec<String> = Vec::new();
        for label in rules.into_iter().chain(std::iter::once(fallback)) {
            if !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
        labels
    }
}

// ============================================================================
// Keyword Classification
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub category: String,
    pub keywords: Vec<String>,
}

fn category(name: &str, keywords: &[&str]) -> CategoryKeywords {
    CategoryKeywords {
        category: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
}

/// Which identity groups orders into one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerKey {
    /// Email, else numeric customer id, else `guest`.
    Email,
    /// Numeric customer id, else email, else `guest`.
    CustomerId,
}

// ============================================================================
// Insight and Alert Thresholds
// ============================================================================

/// Cut-offs for the rule-based trend and forecast insights. Percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightPolicy {
    /// Growth strictly above this is "Strong Growth".
    pub strong_growth_pct: f64,
    /// Growth strictly below this is "Revenue Decline".
    pub decline_below_pct: f64,
    /// Projected order growth strictly above this is an order surge.
    pub order_surge_pct: f64,
    /// Coefficient of variation of the daily series above which a seasonal
    /// pattern is reported.
    pub seasonality_cv: f64,
}

impl Default for InsightPolicy {
    fn default() -> Self {
        Self {
            strong_growth_pct: 10.0,
            decline_below_pct: 0.0,
            order_surge_pct: 15.0,
            seasonality_cv: 0.25,
        }
    }
}

/// Thresholds for the realtime snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimePolicy {
    /// Orders worth strictly more than this raise a high-value alert.
    pub high_value_threshold: f64,
    /// Orders this recent (minutes) are listed as recent activity.
    pub activity_minutes: i64,
    pub activity_limit: usize,
    /// Fewer orders than this in the window is low activity.
    pub low_activity_orders: u64,
    /// More orders than this in the window is high activity.
    pub high_activity_orders: u64,
    /// Cancellation rate (percent) strictly above this needs attention.
    pub cancellation_alert_pct: f64,
}

impl Default for RealtimePolicy {
    fn default() -> Self {
        Self {
            high_value_threshold: 50_000.0,
            activity_minutes: 60,
            activity_limit: 10,
            low_activity_orders: 5,
            high_activity_orders: 20,
            cancellation_alert_pct: 10.0,
        }
    }
}

// ============================================================================
// AnalyticsPolicy
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsPolicy {
    pub customer_key: CustomerKey,
    pub segmentation: SegmentationPolicy,
    /// Products with a cancellation rate strictly above this are high risk.
    pub high_risk_threshold: f64,
    pub cod_keywords: Vec<String>,
    pub razorpay_keyword: String,
    pub call_keywords: Vec<String>,
    pub tele_keywords: Vec<String>,
    pub categories: Vec<CategoryKeywords>,
    pub default_category: String,
    pub top_buyers_limit: usize,
    pub top_sellers_limit: usize,
    pub high_risk_limit: usize,
    /// Longest date range, in days, a single request may cover.
    pub max_range_days: i64,
    pub insights: InsightPolicy,
    pub realtime: RealtimePolicy,
}

impl Default for AnalyticsPolicy {
    fn default() -> Self {
        Self {
            customer_key: CustomerKey::Email,
            segmentation: SegmentationPolicy::default(),
            high_risk_threshold: 15.0,
            cod_keywords: vec!["cod".to_string(), "cashondelivery".to_string()],
            razorpay_keyword: "razorpay".to_string(),
            call_keywords: vec!["call".to_string()],
            tele_keywords: vec!["tele".to_string()],
            categories: vec![
                category("Hand Instruments", &["forceps", "plier"]),
                category("Scaling Equipment", &["scaler", "ultrasonic"]),
                category("Imaging Equipment", &["x-ray", "imaging"]),
                category("Sterilization", &["autoclave", "steriliz"]),
                category("Furniture & Equipment", &["chair", "unit"]),
                category("Restorative Materials", &["composite", "filling"]),
                category("Surgical Instruments", &["surgical", "surgery"]),
                category("Impression Materials", &["impression", "mold"]),
                category("Cleaning & Maintenance", &["cleaning", "polish"]),
                category("Orthodontics", &["orthodontic", "braces"]),
            ],
            default_category: "General Supplies".to_string(),
            top_buyers_limit: 50,
            top_sellers_limit: 100,
            high_risk_limit: 50,
            max_range_days: 731,
            insights: InsightPolicy::default(),
            realtime: RealtimePolicy::default(),
        }
    }
}

impl AnalyticsPolicy {
    pub fn from_yaml(document: &str) -> Result<Self, PolicyError> {
        Ok(serde_yaml::from_str(document)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let policy = Self::from_yaml(&document)?;
        info!(
            "Loaded analytics policy from {} ({} threshold rules, {} score rules, {} categories)",
            path.display(),
            policy.segmentation.threshold_rules.len(),
            policy.segmentation.score_rules.len(),
            policy.categories.len()
        );
        Ok(policy)
    }
}

/// Case-insensitive substring match against any keyword.
pub fn matches_any(haystack: &str, keywords: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold_labels() {
        let policy = SegmentationPolicy::default();
        assert_eq!(
            policy.labels(SegmentationStrategy::Threshold),
            vec!["Champions", "Loyal", "At Risk", "New", "Hibernating"]
        );
        assert_eq!(policy.labels(SegmentationStrategy::RfmScore).len(), 11);
    }

    #[test]
    fn test_yaml_overrides_keep_defaults() {
        let policy = AnalyticsPolicy::from_yaml(
            r#"
high_risk_threshold: 20.0
segmentation:
  strategy: rfm_score
  monetary_scoring: quintile
"#,
        )
        .unwrap();

        assert_eq!(policy.high_risk_threshold, 20.0);
        assert_eq!(policy.segmentation.strategy, SegmentationStrategy::RfmScore);
        assert_eq!(policy.segmentation.monetary_scoring, MonetaryScoring::Quintile);
        assert_eq!(policy.segmentation.threshold_rules.len(), 4);
        assert_eq!(policy.cod_keywords, vec!["cod", "cashondelivery"]);
        assert_eq!(policy.max_range_days, 731);
        assert_eq!(policy.realtime, RealtimePolicy::default());
    }

    #[test]
    fn test_yaml_overrides_nested_thresholds() {
        let policy = AnalyticsPolicy::from_yaml(
            r#"
max_range_days: 90
insights:
  strong_growth_pct: 25.0
realtime:
  high_value_threshold: 10000
"#,
        )
        .unwrap();

        assert_eq!(policy.max_range_days, 90);
        assert_eq!(policy.insights.strong_growth_pct, 25.0);
        assert_eq!(policy.insights.order_surge_pct, 15.0);
        assert_eq!(policy.realtime.high_value_threshold, 10_000.0);
        assert_eq!(policy.realtime.activity_limit, 10);
    }

    #[test]
    fn test_yaml_rejects_unknown_strategy() {
        let err = AnalyticsPolicy::from_yaml("segmentation:\n  strategy: vibes\n").unwrap_err();
        assert!(matches!(err, PolicyError::Parse(_)));
    }

    #[test]
    fn test_threshold_rule_bounds_are_inclusive() {
        let rule = ThresholdRule::new("x").frequency(Some(3), None).recency(None, Some(60));
        assert!(rule.matches(3, 60));
        assert!(!rule.matches(2, 10));
        assert!(!rule.matches(3, 61));
    }

    #[test]
    fn test_matches_any_is_case_insensitive() {
        let keywords = vec!["cod".to_string()];
        assert!(matches_any("PayU_COD", &keywords));
        assert!(!matches_any("razorpay", &keywords));
        assert!(!matches_any("anything", &[String::new()]));
    }
}
