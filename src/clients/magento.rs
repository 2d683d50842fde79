//! # Order Fetcher
//!
//! Pages through the storefront's `GET /orders` search endpoint for a date
//! range. The whole fetch is bounded by a page ceiling and an overall
//! timeout; callers that prefer a partial dashboard to an error page use
//! [`fetch_or_empty`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::UpstreamConfig;
use crate::models::{DateRange, Order, OrderPage};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream base URL is not configured")]
    NotConfigured,
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream fetch exceeded {0:?}")]
    Timeout(Duration),
    #[error("invalid upstream header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

/// Anything that can produce the orders of a date range.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_orders(&self, range: &DateRange) -> Result<Vec<Order>, FetchError>;
}

/// Fetch orders, degrading any failure to an empty list.
pub async fn fetch_or_empty(source: &dyn OrderSource, range: &DateRange) -> Vec<Order> {
    match source.fetch_orders(range).await {
        Ok(orders) => orders,
        Err(e) => {
            warn!(
                "Order fetch for {} to {} failed, continuing with no orders: {}",
                range.start_date, range.end_date, e
            );
            Vec::new()
        }
    }
}

#[derive(Debug, Clone)]
pub struct MagentoClient {
    config: UpstreamConfig,
    http: Client,
}

impl MagentoClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, http })
    }

    fn orders_url(&self) -> String {
        format!("{}/orders", self.config.base_url)
    }

    /// `searchCriteria` query pairs for one page of the range.
    pub fn search_criteria(range: &DateRange, page_size: u32, page: u32) -> Vec<(String, String)> {
        let filter = |group: usize, value: String, condition: &str| {
            let prefix = format!("searchCriteria[filterGroups][{}][filters][0]", group);
            [
                (format!("{}[field]", prefix), "created_at".to_string()),
                (format!("{}[value]", prefix), value),
                (format!("{}[conditionType]", prefix), condition.to_string()),
            ]
        };

        let mut query = Vec::with_capacity(8);
        query.extend(filter(0, format!("{} 00:00:00", range.start_date), "from"));
        query.extend(filter(1, format!("{} 23:59:59", range.end_date), "to"));
        query.push(("searchCriteria[pageSize]".to_string(), page_size.to_string()));
        query.push(("searchCriteria[currentPage]".to_string(), page.to_string()));
        query
    }

    async fn fetch_page(&self, range: &DateRange, page: u32) -> Result<OrderPage, FetchError> {
        let response = self
            .http
            .get(self.orders_url())
            .bearer_auth(&self.config.api_token)
            .query(&Self::search_criteria(range, self.config.page_size, page))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<OrderPage>().await?)
    }

    async fn fetch_all(&self, range: &DateRange) -> Result<Vec<Order>, FetchError> {
        let mut orders: Vec<Order> = Vec::new();

        for page in 1..=self.config.max_pages {
            let batch = self.fetch_page(range, page).await?;
            let received = batch.items.len();
            debug!("Fetched page {} ({} orders, total_count {})", page, received, batch.total_count);
            orders.extend(batch.items);

            if received == 0 || orders.len() as u64 >= batch.total_count {
                return Ok(orders);
            }
            if page == self.config.max_pages {
                warn!(
                    "Stopped after {} pages with {} of {} orders",
                    page,
                    orders.len(),
                    batch.total_count
                );
            }
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderSource for MagentoClient {
    async fn fetch_orders(&self, range: &DateRange) -> Result<Vec<Order>, FetchError> {
        if self.config.base_url.is_empty() {
            return Err(FetchError::NotConfigured);
        }

        let orders = tokio::time::timeout(self.config.timeout, self.fetch_all(range))
            .await
            .map_err(|_| FetchError::Timeout(self.config.timeout))??;

        info!(
            "Fetched {} orders for {} to {}",
            orders.len(),
            range.start_date,
            range.end_date
        );
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct Failing;

    #[async_trait]
    impl OrderSource for Failing {
        async fn fetch_orders(&self, _range: &DateRange) -> Result<Vec<Order>, FetchError> {
            Err(FetchError::Status {
                status: 503,
                body: "maintenance".into(),
            })
        }
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
        )
    }

    #[test]
    fn test_search_criteria_encodes_inclusive_range() {
        let query = MagentoClient::search_criteria(&range(), 500, 2);
        let get = |key: &str| query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("searchCriteria[filterGroups][0][filters][0][field]"), Some("created_at"));
        assert_eq!(get("searchCriteria[filterGroups][0][filters][0][value]"), Some("2025-03-01 00:00:00"));
        assert_eq!(get("searchCriteria[filterGroups][0][filters][0][conditionType]"), Some("from"));
        assert_eq!(get("searchCriteria[filterGroups][1][filters][0][value]"), Some("2025-03-31 23:59:59"));
        assert_eq!(get("searchCriteria[filterGroups][1][filters][0][conditionType]"), Some("to"));
        assert_eq!(get("searchCriteria[pageSize]"), Some("500"));
        assert_eq!(get("searchCriteria[currentPage]"), Some("2"));
    }

    #[tokio::test]
    async fn test_fetch_or_empty_fails_open() {
        assert!(fetch_or_empty(&Failing, &range()).await.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_client_reports_not_configured() {
        let client = MagentoClient::new(UpstreamConfig::default()).unwrap();
        let result = client.fetch_orders(&range()).await;
        assert!(matches!(result, Err(FetchError::NotConfigured)));
    }
}
