//! Retrieval strategy traits.
//!
//! A retrieval strategy turns a [`SearchQuery`] into raw page content or a
//! structured payload. Strategies know nothing about rulings: recognizing
//! them is the extractor's job, so every strategy's output goes through the
//! same extraction path.
//!
//! # Usage
//!
//! ```rust,ignore
//! use relatoria::traits::strategy::RetrievalStrategy;
//!
//! match strategy.attempt(&query).await {
//!     StrategyOutcome::Success(payload) => extract(&payload),
//!     StrategyOutcome::Failure(err) => warn!(error = %err, "attempt failed"),
//! }
//! ```

use async_trait::async_trait;

use crate::types::payload::{RawPayload, StrategyOutcome};
use crate::types::query::SearchQuery;

/// A strategy that may fail.
///
/// Implementations:
/// - `BrowserRenderStrategy` - headless browser render of the search application
/// - `StaticFetchStrategy` - plain HTTP GET of the search page
/// - `HiddenApiStrategy` - probes the structured endpoints behind the application
/// - `ScriptedStrategy` - canned outcomes for tests
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Run one attempt for the query.
    ///
    /// Failures are returned as [`StrategyOutcome::Failure`], never panics.
    async fn attempt(&self, query: &SearchQuery) -> StrategyOutcome;

    /// Get the strategy name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

/// The last link of the chain. Always produces a payload.
#[async_trait]
pub trait FallbackStrategy: Send + Sync {
    async fn synthesize(&self, query: &SearchQuery) -> RawPayload;

    fn name(&self) -> &str {
        "fallback"
    }
}

#[async_trait]
impl<T: RetrievalStrategy + ?Sized> RetrievalStrategy for std::sync::Arc<T> {
    async fn attempt(&self, query: &SearchQuery) -> StrategyOutcome {
        (**self).attempt(query).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: FallbackStrategy + ?Sized> FallbackStrategy for std::sync::Arc<T> {
    async fn synthesize(&self, query: &SearchQuery) -> RawPayload {
        (**self).synthesize(query).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
