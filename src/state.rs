//! Shared, immutable application state handed to every request through an
//! axum `Extension`.

use std::sync::Arc;

use crate::clients::{NarrativeGenerator, OrderSource};
use crate::config::BasicCredentials;
use crate::handlers::policy::AnalyticsPolicy;
use crate::report_registry::ReportRegistry;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderSource>,
    pub narrator: Arc<dyn NarrativeGenerator>,
    pub policy: Arc<AnalyticsPolicy>,
    pub reports: Arc<ReportRegistry>,
    /// `None` disables basic auth on `/api`.
    pub auth: Option<Arc<BasicCredentials>>,
}

impl AppState {
    pub fn new(
        orders: Arc<dyn OrderSource>,
        narrator: Arc<dyn NarrativeGenerator>,
        policy: AnalyticsPolicy,
    ) -> Self {
        Self {
            orders,
            narrator,
            policy: Arc::new(policy),
            reports: Arc::new(ReportRegistry::new()),
            auth: None,
        }
    }

    pub fn with_auth(mut self, credentials: BasicCredentials) -> Self {
        self.auth = Some(Arc::new(credentials));
        self
    }
}
