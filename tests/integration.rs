//! # Integration Tests
//!
//! These tests drive the full Axum router in-process with `tower::ServiceExt::oneshot`.
//! The upstream order API and the narrative API are replaced by in-memory
//! stubs, so no network access or running server is needed.
//!
//! ```bash
//! cargo test --test integration
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;

use storefront_insights::clients::{FetchError, NarrativeError, NarrativeGenerator, OrderSource};
use storefront_insights::config::BasicCredentials;
use storefront_insights::create_app;
use storefront_insights::handlers::policy::AnalyticsPolicy;
use storefront_insights::models::{DateRange, Order};
use storefront_insights::state::AppState;

// ============================================================================
// Stubs
// ============================================================================

/// Serves a fixed order list and records the ranges it was asked for.
struct StubOrders {
    orders: Vec<Order>,
    requested: Mutex<Vec<DateRange>>,
}

#[async_trait]
impl OrderSource for StubOrders {
    async fn fetch_orders(&self, range: &DateRange) -> Result<Vec<Order>, FetchError> {
        self.requested.lock().unwrap().push(*range);
        Ok(self.orders.clone())
    }
}

struct FailingOrders;

#[async_trait]
impl OrderSource for FailingOrders {
    async fn fetch_orders(&self, _range: &DateRange) -> Result<Vec<Order>, FetchError> {
        Err(FetchError::Status {
            status: 502,
            body: "bad gateway".into(),
        })
    }
}

struct CannedNarrator(Option<&'static str>);

#[async_trait]
impl NarrativeGenerator for CannedNarrator {
    async fn generate(&self, _prompt: &str, _data: &Value) -> Result<String, NarrativeError> {
        self.0.map(str::to_string).ok_or(NarrativeError::Status(500))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn upstream_orders() -> Vec<Order> {
    let raw = json!([
        {
            "entity_id": 1, "created_at": "2025-03-01 09:00:00", "status": "complete",
            "grand_total": "1000.00", "customer_email": "a@clinic.example",
            "payment": {"method": "razorpay"},
            "shipping_description": "Standard web delivery",
            "items": [{"sku": "FX-1", "name": "Extraction Forceps", "qty_ordered": "4.0000", "row_total": "1000.00"}]
        },
        {
            "entity_id": 2, "created_at": "2025-03-01 17:30:00", "status": "pending",
            "grand_total": 250.5, "customer_email": "b@clinic.example",
            "payment": {"method": "cashondelivery"},
            "shipping_description": "Call order",
            "items": [{"sku": "GL-1", "name": "Nitrile Gloves, \"Large\"", "qty_ordered": 5, "row_total": 250.5}]
        },
        {
            "entity_id": 3, "created_at": "2025-03-02 11:00:00", "status": "canceled",
            "grand_total": "400", "customer_email": "a@clinic.example",
            "status_histories": [{"comment": "Customer changed mind"}],
            "items": [{"sku": "FX-1", "name": "Extraction Forceps", "qty_ordered": 1, "row_total": 400}]
        },
        {
            "entity_id": 4, "created_at": "2025-03-03 08:15:00", "status": "processing",
            "grand_total": "149.50", "customer_id": 77,
            "items": [{"sku": "SC-1", "name": "Ultrasonic Scaler", "qty_ordered": 1, "row_total": 149.5}]
        },
        {
            "entity_id": 5, "created_at": "2025-03-03 20:00:00", "status": "cancelled",
            "grand_total": "100", "customer_email": "c@clinic.example",
            "items": []
        },
        {
            "entity_id": 6, "created_at": "2025-04-15 10:00:00", "status": "complete",
            "grand_total": "NaN", "customer_email": "late@clinic.example"
        }
    ]);
    serde_json::from_value(raw).unwrap()
}

fn stub_state(narrative: Option<&'static str>) -> (AppState, Arc<StubOrders>) {
    let source = Arc::new(StubOrders {
        orders: upstream_orders(),
        requested: Mutex::new(Vec::new()),
    });
    let state = AppState::new(
        source.clone(),
        Arc::new(CannedNarrator(narrative)),
        AnalyticsPolicy::default(),
    );
    (state, source)
}

fn app() -> Router {
    create_app(stub_state(Some("Revenue is steady.")).0)
}

const MARCH: &str = "start_date=2025-03-01&end_date=2025-03-31";

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get_text(app: Router, uri: &str) -> (StatusCode, header::HeaderMap, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["reports"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_dashboard_totals_for_range() {
    let (state, source) = stub_state(Some("Revenue is steady."));
    let (status, body) = get(create_app(state), &format!("/api/dashboard?{}", MARCH)).await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["summary"]["orders"], 5);
    assert_eq!(data["summary"]["revenue"], 1900.0);
    assert_eq!(data["summary"]["cancelled_orders"], 2);
    assert_eq!(data["summary"]["cancellation_rate"], 40.0);
    assert_eq!(data["summary"]["cod_orders"], 1);
    assert_eq!(data["summary"]["razorpay_orders"], 1);
    assert_eq!(data["daily"].as_array().unwrap().len(), 3);
    assert_eq!(data["daily"][0]["period"], "2025-03-01");
    assert_eq!(data["narrative"], "Revenue is steady.");
    assert_eq!(body["message"], "Dashboard for 2025-03-01 to 2025-03-31 (5 orders)");

    let requested = source.requested.lock().unwrap();
    assert_eq!(requested[0].start_date.to_string(), "2025-03-01");
    assert_eq!(requested[0].end_date.to_string(), "2025-03-31");
}

#[tokio::test]
async fn test_narrative_failure_uses_placeholder() {
    let (state, _) = stub_state(None);
    let (status, body) = get(create_app(state), &format!("/api/trends?{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["narrative"], "AI analysis unavailable");
}

#[tokio::test]
async fn test_upstream_failure_fails_open() {
    let state = AppState::new(
        Arc::new(FailingOrders),
        Arc::new(CannedNarrator(None)),
        AnalyticsPolicy::default(),
    );
    let (status, body) = get(create_app(state), &format!("/api/dashboard?{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["summary"]["orders"], 0);
    assert_eq!(body["data"]["summary"]["revenue"], 0.0);
}

#[tokio::test]
async fn test_customers_with_both_strategies() {
    let uri = format!("/api/customers?{}&as_of=2025-04-01T00:00:00Z", MARCH);
    let (status, body) = get(app(), &uri).await;
    assert_eq!(status, StatusCode::OK);

    let customers = body["data"]["customers"].as_array().unwrap();
    assert_eq!(customers.len(), 4);
    let a = customers
        .iter()
        .find(|c| c["customer_key"] == "a@clinic.example")
        .unwrap();
    assert_eq!(a["order_count"], 2);
    assert_eq!(a["frequency"], 1);
    assert_eq!(a["monetary"], 1000.0);
    assert_eq!(a["recency_days"], 29);
    assert_eq!(a["segment"], "New");
    assert!(customers.iter().any(|c| c["customer_key"] == "77"));
    assert_eq!(body["data"]["summary"]["strategy"], "threshold");

    let (status, body) = get(app(), &format!("{}&strategy=rfm_score&monetary=quintile", uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["summary"]["strategy"], "rfm_score");
    assert_eq!(body["data"]["summary"]["segments"].as_array().unwrap().len(), 11);
    assert!(body["data"]["customers"][0]["scores"]["recency"].is_number());
}

#[tokio::test]
async fn test_products_and_detail() {
    let (status, body) = get(app(), &format!("/api/products?{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_products"], 3);
    assert_eq!(body["data"]["top_sellers"][0]["sku"], "FX-1");
    assert_eq!(body["data"]["high_risk"][0]["sku"], "FX-1");
    assert_eq!(body["data"]["high_risk"][0]["cancellation_rate"], 20.0);

    let (status, body) = get(app(), &format!("/api/products?{}&risk_threshold=25", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["high_risk"].as_array().unwrap().is_empty());

    let (status, body) = get(app(), &format!("/api/products/SC-1?{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["product"]["category"], "Scaling Equipment");

    let (status, body) = get(app(), &format!("/api/products/NOPE?{}", MARCH)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cancellations_and_classification() {
    let (status, body) = get(app(), &format!("/api/cancellations?{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_cancelled"], 2);
    assert_eq!(body["data"]["lost_revenue"], 500.0);
    assert_eq!(body["data"]["top_reasons"][0]["reason"], "Customer changed mind");

    let (status, body) = get(app(), &format!("/api/classification?{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 5);
    assert_eq!(body["data"]["call"], 1);
    assert_eq!(body["data"]["cod"], 1);
    assert_eq!(body["data"]["online"], 4);
}

#[tokio::test]
async fn test_forecast_respects_gap_policy() {
    let (status, body) = get(app(), &format!("/api/forecast?{}&horizon=3", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["series"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["forecast"]["projection"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["fill_gaps"], false);

    let (_, body) = get(app(), &format!("/api/forecast?{}&fill_gaps=true", MARCH)).await;
    assert_eq!(body["data"]["series"].as_array().unwrap().len(), 31);
    assert_eq!(body["data"]["fill_gaps"], true);
    assert!(body["data"]["orders_forecast"]["projection"].is_array());
    assert!(body["data"]["recommendations"].is_array());
}

#[tokio::test]
async fn test_trends_carry_insights() {
    let (status, body) = get(app(), &format!("/api/trends?{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    let insights = body["data"]["insights"].as_array().unwrap();
    assert!(insights.iter().any(|i| i["type"] == "Category Leadership"));
    assert!(body["data"]["recommendations"].is_array());
}

#[tokio::test]
async fn test_oversized_range_is_rejected_before_fetch() {
    let (state, source) = stub_state(None);
    let uri = "/api/forecast?start_date=0001-01-01&end_date=9999-12-31&fill_gaps=true";
    let (status, body) = get(create_app(state), uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_DATE_RANGE");
    assert!(source.requested.lock().unwrap().is_empty());

    let earliest = NaiveDate::MIN.format("%Y-%m-%d");
    let (status, body) = get(app(), &format!("/api/dashboard?end_date={}", earliest)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_PARAMETER");
}

#[tokio::test]
async fn test_realtime_window() {
    let (state, source) = stub_state(None);
    let uri = "/api/realtime?interval=4hours&as_of=2025-03-01T18:00:00Z";
    let (status, body) = get(create_app(state), uri).await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(data["interval"], "4hours");
    assert_eq!(data["metrics"]["total_orders"], 1);
    assert_eq!(data["metrics"]["pending_orders"], 1);
    assert_eq!(data["recent_activity"][0]["order_id"], "2");
    assert_eq!(data["recent_activity"][0]["minutes_ago"], 30);
    assert_eq!(data["recommendations"][0]["category"], "Low Activity");
    {
        let requested = source.requested.lock().unwrap();
        assert_eq!(requested[0].start_date.to_string(), "2025-03-01");
        assert_eq!(requested[0].end_date.to_string(), "2025-03-01");
    }

    let (status, body) = get(
        app(),
        "/api/analytics?type=realtime&interval=24hours&as_of=2025-03-01T18:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["metrics"]["total_orders"], 2);
    assert_eq!(body["data"]["metrics"]["total_revenue"], 1250.5);

    let (status, body) = get(app(), "/api/realtime?interval=weekly").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_PARAMETER");
}

#[tokio::test]
async fn test_unified_endpoint() {
    let (status, body) = get(app(), &format!("/api/analytics?type=cancellations&{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_cancelled"], 2);

    let (status, body) = get(app(), &format!("/api/analytics?{}", MARCH)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "MISSING_PARAMETER");

    let (status, body) = get(app(), "/api/analytics?type=overview").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UNKNOWN_REPORT");

    let (status, headers, csv) = get_text(app(), &format!("/api/analytics?type=products&export=products&{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    assert_eq!(csv.lines().count(), 4);
}

#[tokio::test]
async fn test_bad_parameters_are_400() {
    let (status, body) = get(app(), "/api/dashboard?start_date=2025-04-01&end_date=2025-03-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_DATE_RANGE");

    let (status, body) = get(app(), "/api/customers?strategy=clusters").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_PARAMETER");

    let (status, _) = get(app(), "/api/export/invoices").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_product_export_csv() {
    let (status, headers, csv) = get_text(app(), &format!("/api/export/products?{}", MARCH)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"products_2025-03-01_to_2025-03-31.csv\""
    );

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("sku,name,category"));
    assert!(lines.iter().any(|l| l.starts_with("GL-1,\"Nitrile Gloves, \"\"Large\"\"\",")));
}

#[tokio::test]
async fn test_basic_auth_gates_api_but_not_health() {
    let (state, _) = stub_state(None);
    let state = state.with_auth(BasicCredentials {
        username: "admin".into(),
        password: "secret".into(),
    });
    let app = create_app(state);

    let (status, _) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/dashboard").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let wrong = format!("Basic {}", STANDARD.encode("admin:nope"));
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/dashboard")
                .header(header::AUTHORIZATION, wrong)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let right = format!("Basic {}", STANDARD.encode("admin:secret"));
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/dashboard?{}", MARCH))
                .header(header::AUTHORIZATION, right)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
