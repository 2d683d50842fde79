//! Thin wrappers around the two external services: the storefront's order
//! API and the generative-text API used for narrative commentary.

pub mod magento;
pub mod narrative;

pub use magento::{fetch_or_empty, FetchError, MagentoClient, OrderSource};
pub use narrative::{narrate_or_placeholder, DisabledNarrator, GeminiNarrator, NarrativeError, NarrativeGenerator};
