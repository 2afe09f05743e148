//! Retrieval strategy implementations.
//!
//! - [`BrowserRenderStrategy`] - headless browser render
//! - [`StaticFetchStrategy`] - plain HTTP fetch
//! - [`HiddenApiStrategy`] - structured endpoint probing
//! - [`DeterministicFallbackStrategy`] - catalog-based last resort
//! - [`mock`] - scripted strategies for tests

pub mod browser;
pub mod fallback;
pub mod hidden_api;
pub mod mock;
pub mod static_fetch;

pub use browser::BrowserRenderStrategy;
pub use fallback::DeterministicFallbackStrategy;
pub use hidden_api::HiddenApiStrategy;
pub use mock::{CallLog, ScriptedFallback, ScriptedStrategy};
pub use static_fetch::{ConnectivityReport, StaticFetchStrategy};

use crate::error::SearchResult;
use crate::types::config::ScraperConfig;

/// Build the HTTP client shared by the network strategies.
///
/// Idle connections are not pooled, so the same client works from the
/// blocking entry point's private runtime and from the pool's runtime.
pub fn build_client(config: &ScraperConfig) -> SearchResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(config.headers.user_agent.clone())
        .pool_max_idle_per_host(0)
        .connect_timeout(config.timeouts.api_request)
        .build()?;
    Ok(client)
}
