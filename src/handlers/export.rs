//! CSV renderings of the order, customer, product and cancellation reports.

use serde::Serialize;
use thiserror::Error;

use super::products::ProductAggregate;
use super::rollup::CancelledOrder;
use super::segmentation::CustomerAggregate;
use crate::models::{DateRange, Order};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer could not be flushed: {0}")]
    Flush(#[from] std::io::Error),
    #[error("csv output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Reports available as CSV downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Orders,
    Customers,
    Products,
    Cancellations,
}

impl ExportKind {
    pub const ALL: [ExportKind; 4] = [Self::Orders, Self::Customers, Self::Products, Self::Cancellations];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Cancellations => "cancellations",
        }
    }

    /// `<report>_<start>_to_<end>.csv`
    pub fn filename(&self, range: &DateRange) -> String {
        format!("{}_{}_to_{}.csv", self.as_str(), range.start_date, range.end_date)
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Default, Serialize)]
struct OrderRow<'a> {
    order_id: &'a str,
    increment_id: &'a str,
    created_at: String,
    status: &'a str,
    grand_total: f64,
    customer_email: &'a str,
    payment_method: &'a str,
    shipping_description: &'a str,
    line_items: usize,
}

#[derive(Default, Serialize)]
struct CustomerRow<'a> {
    customer: &'a str,
    email: &'a str,
    segment: &'a str,
    orders: u32,
    frequency: u32,
    monetary: f64,
    avg_order_value: f64,
    recency_days: Option<i64>,
    cancelled_orders: u32,
    cancellation_rate: f64,
    last_order: String,
}

#[derive(Default, Serialize)]
struct ProductRow<'a> {
    sku: &'a str,
    name: &'a str,
    category: &'a str,
    quantity_sold: i64,
    gross_revenue: f64,
    net_revenue: f64,
    cancelled_quantity: i64,
    cancellation_rate: f64,
    avg_unit_price: f64,
}

#[derive(Default, Serialize)]
struct CancellationRow<'a> {
    order_id: &'a str,
    date: &'a str,
    customer_email: &'a str,
    amount: f64,
    payment_method: &'a str,
}

// ============================================================================
// Writers
// ============================================================================

/// Header line plus one record per row. The header comes from the row
/// type's field names, so an empty export still carries it.
fn write_rows<T, I>(rows: I) -> Result<String, ExportError>
where
    T: Serialize + Default,
    I: IntoIterator<Item = T>,
{
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_none() {
        return header_only::<T>();
    }
    serialize_all(rows)
}

fn header_only<T: Serialize + Default>() -> Result<String, ExportError> {
    let text = serialize_all(std::iter::once(T::default()))?;
    Ok(text.split_inclusive('\n').next().unwrap_or_default().to_string())
}

fn serialize_all<T: Serialize>(rows: impl Iterator<Item = T>) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn orders_csv(orders: &[Order]) -> Result<String, ExportError> {
    write_rows(orders.iter().map(|o| OrderRow {
        order_id: &o.id,
        increment_id: o.increment_id.as_deref().unwrap_or_default(),
        created_at: o
            .created_at
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),
        status: o.status.as_str(),
        grand_total: o.grand_total,
        customer_email: o.email().unwrap_or_default(),
        payment_method: o.payment_method().unwrap_or_default(),
        shipping_description: o.shipping_description.as_deref().unwrap_or_default(),
        line_items: o.items.len(),
    }))
}

pub fn customers_csv(customers: &[CustomerAggregate]) -> Result<String, ExportError> {
    write_rows(customers.iter().map(|c| CustomerRow {
        customer: &c.customer_key,
        email: c.email.as_deref().unwrap_or_default(),
        segment: &c.segment,
        orders: c.order_count,
        frequency: c.frequency,
        monetary: c.monetary,
        avg_order_value: c.avg_order_value,
        recency_days: c.recency_days,
        cancelled_orders: c.cancelled_orders,
        cancellation_rate: c.cancellation_rate,
        last_order: c
            .last_order
            .map(|ts| ts.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    }))
}

pub fn products_csv(products: &[ProductAggregate]) -> Result<String, ExportError> {
    write_rows(products.iter().map(|p| ProductRow {
        sku: &p.sku,
        name: &p.name,
        category: &p.category,
        quantity_sold: p.quantity_sold,
        gross_revenue: p.gross_revenue,
        net_revenue: p.net_revenue,
        cancelled_quantity: p.cancelled_quantity,
        cancellation_rate: p.cancellation_rate,
        avg_unit_price: p.avg_unit_price,
    }))
}

pub fn cancellations_csv(cancelled: &[CancelledOrder]) -> Result<String, ExportError> {
    write_rows(cancelled.iter().map(|c| CancellationRow {
        order_id: &c.order_id,
        date: c.date.as_deref().unwrap_or_default(),
        customer_email: c.customer_email.as_deref().unwrap_or_default(),
        amount: c.amount,
        payment_method: &c.payment_method,
    }))
}
