//! # Storefront Insights
//!
//! Axum service that pulls orders from the storefront's REST API and serves
//! revenue, customer segment, product, cancellation and trend analytics to
//! the dashboard front end.
//!
//! ## Architecture
//!
//! - `clients` wrap the upstream order API and the narrative API
//! - `handlers` hold the pure aggregation core
//! - `routes` validate queries, fetch orders and render JSON or CSV
//! - `AnalyticsPolicy` carries every threshold and keyword list

use std::sync::Arc;

use tracing::{info, warn};

use storefront_insights::clients::{DisabledNarrator, GeminiNarrator, MagentoClient, NarrativeGenerator};
use storefront_insights::config::AppConfig;
use storefront_insights::create_app;
use storefront_insights::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_insights=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting storefront insights service");

    let config = AppConfig::from_env()?;

    if config.upstream.base_url.is_empty() {
        warn!("MAGENTO_BASE_URL is not set; every report will be empty");
    }
    let orders = Arc::new(MagentoClient::new(config.upstream.clone())?);

    let narrator: Arc<dyn NarrativeGenerator> = match &config.narrative.api_key {
        Some(key) => {
            info!("Narrative generation enabled ({})", config.narrative.model);
            Arc::new(GeminiNarrator::new(key.clone(), config.narrative.clone())?)
        }
        None => {
            info!("GEMINI_API_KEY is not set; narratives disabled");
            Arc::new(DisabledNarrator)
        }
    };

    let mut state = AppState::new(orders, narrator, config.policy.clone());
    match config.auth.clone() {
        Some(credentials) => {
            info!("Basic auth enabled for user {}", credentials.username);
            state = state.with_auth(credentials);
        }
        None => warn!("DASHBOARD_AUTH is not set; /api is unauthenticated"),
    }
    info!(
        "Report registry initialized with {} reports",
        state.reports.report_count()
    );

    let app = create_app(state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
