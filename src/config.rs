//! Runtime configuration, read once from the environment at startup.
//!
//! `dotenvy` populates the environment from `.env` in `main` before
//! [`AppConfig::from_env`] runs. Nothing else in the crate reads env vars.

use std::time::Duration;

use thiserror::Error;

use crate::handlers::policy::{AnalyticsPolicy, PolicyError};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_USER_AGENT: &str = concat!("storefront-insights/", env!("CARGO_PKG_VERSION"));
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("DASHBOARD_AUTH must look like user:password")]
    InvalidCredentials,
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the REST API, e.g. `https://shop.example/rest/V1`.
    pub base_url: String,
    pub api_token: String,
    pub page_size: u32,
    pub max_pages: u32,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: String::new(),
            page_size: 500,
            max_pages: 10,
            timeout: Duration::from_secs(25),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    /// `None` disables narrative generation.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.split_once(':') {
            Some((user, pass)) if !user.is_empty() => Ok(Self {
                username: user.to_string(),
                password: pass.to_string(),
            }),
            _ => Err(ConfigError::InvalidCredentials),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub upstream: UpstreamConfig,
    pub narrative: NarrativeConfig,
    /// `None` leaves the API unauthenticated.
    pub auth: Option<BasicCredentials>,
    pub policy: AnalyticsPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let upstream_defaults = UpstreamConfig::default();
        let narrative_defaults = NarrativeConfig::default();

        let upstream = UpstreamConfig {
            base_url: var("MAGENTO_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            api_token: var("MAGENTO_API_TOKEN").unwrap_or_default(),
            page_size: number(&var, "UPSTREAM_PAGE_SIZE", upstream_defaults.page_size)?,
            max_pages: number(&var, "UPSTREAM_MAX_PAGES", upstream_defaults.max_pages)?,
            timeout: Duration::from_secs(number(
                &var,
                "UPSTREAM_TIMEOUT_SECS",
                upstream_defaults.timeout.as_secs() as u32,
            )? as u64),
            user_agent: var("UPSTREAM_USER_AGENT").unwrap_or(upstream_defaults.user_agent),
        };

        let narrative = NarrativeConfig {
            api_key: var("GEMINI_API_KEY"),
            model: var("GEMINI_MODEL").unwrap_or(narrative_defaults.model),
            base_url: var("GEMINI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(narrative_defaults.base_url),
            timeout: Duration::from_secs(number(
                &var,
                "NARRATIVE_TIMEOUT_SECS",
                narrative_defaults.timeout.as_secs() as u32,
            )? as u64),
        };

        let auth = var("DASHBOARD_AUTH")
            .map(|raw| BasicCredentials::parse(&raw))
            .transpose()?;

        let policy = match var("ANALYTICS_POLICY_PATH") {
            Some(path) => AnalyticsPolicy::from_file(path)?,
            None => AnalyticsPolicy::default(),
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            upstream,
            narrative,
            auth,
            policy,
        })
    }
}

fn number<F>(var: &F, name: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { name, value: raw }),
        },
    }
}
