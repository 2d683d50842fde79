//! Domain models for the storefront insights service.
//!
//! `Order` and `LineItem` mirror the upstream order API's JSON records. The
//! upstream is loose about types (numbers arrive as strings, ids as numbers,
//! totals occasionally as garbage), so every numeric field goes through a
//! lenient deserializer that degrades malformed input to zero instead of
//! failing the whole payload.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Upstream Records
// ============================================================================

/// Order status as reported by the upstream, compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Processing,
    Complete,
    /// US spelling, what the upstream actually emits.
    Canceled,
    /// UK spelling, seen in older records.
    Cancelled,
    Other(String),
}

impl OrderStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Canceled | Self::Cancelled)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Canceled => "canceled",
            Self::Cancelled => "cancelled",
            Self::Other(raw) => raw,
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "complete" => Self::Complete,
            "canceled" => Self::Canceled,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payment {
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusHistory {
    #[serde(default)]
    pub comment: Option<String>,
}

/// A single order line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub sku: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, rename = "qty_ordered", deserialize_with = "lenient_quantity")]
    pub quantity: i64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub row_total: f64,
}

/// An order record from the upstream order API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, rename = "entity_id", deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default)]
    pub increment_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub grand_total: f64,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payment: Option<Payment>,
    #[serde(default)]
    pub shipping_description: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub status_histories: Vec<StatusHistory>,
}

impl Order {
    pub fn day(&self) -> Option<NaiveDate> {
        self.created_at.map(|ts| ts.date())
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment
            .as_ref()
            .and_then(|p| p.method.as_deref())
            .filter(|m| !m.is_empty())
    }

    pub fn email(&self) -> Option<&str> {
        self.customer_email.as_deref().filter(|e| !e.is_empty())
    }

    pub fn numeric_customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref().filter(|id| !id.is_empty())
    }

    /// First status history comment, used as the cancellation reason.
    pub fn first_comment(&self) -> Option<&str> {
        self.status_histories
            .first()
            .and_then(|h| h.comment.as_deref())
            .filter(|c| !c.is_empty())
    }
}

/// One page of the upstream search response.
#[derive(Debug, Default, Deserialize)]
pub struct OrderPage {
    #[serde(default)]
    pub items: Vec<Order>,
    #[serde(default)]
    pub total_count: u64,
}

// ============================================================================
// Lenient Field Coercion
// ============================================================================

/// Coerce an upstream JSON value to a finite amount, `0.0` otherwise.
pub fn coerce_amount(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_amount(&value))
}

fn lenient_quantity<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_amount(&value).trunc() as i64)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Parse the timestamp formats the upstream is known to produce.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_timestamp))
}

// ============================================================================
// Request Models
// ============================================================================

/// Inclusive calendar date range used for fetching and filtering orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { start_date, end_date }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start_date && day <= self.end_date
    }

    /// Every day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end_date;
        self.start_date.iter_days().take_while(move |d| *d <= end)
    }
}

// ============================================================================
// Response Models
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
        }
    }
}
