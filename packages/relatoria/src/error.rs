//! Typed errors for the ruling search library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Only [`SearchError`] ever reaches a caller of the search entry points.
//! [`StrategyError`] is absorbed by the strategy chain, which logs it and
//! moves on to the next strategy.

use std::time::Duration;

use thiserror::Error;

use crate::types::payload::StrategyKind;

/// Errors visible to callers of the search surface.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Malformed input, rejected before any strategy runs
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// No free worker in the pool (only from `SearchPool::try_submit`)
    #[error("search pool exhausted: all workers busy")]
    PoolExhausted,

    /// A pooled search task panicked or was cancelled
    #[error("search worker failed: {0}")]
    WorkerFailed(String),

    /// The blocking entry point could not start its runtime
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// An environment option could not be parsed
    #[error("config error for {key}: {reason}")]
    Config { key: String, reason: String },

    /// The shared HTTP client could not be built
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl SearchError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }
}

/// Reasons a single strategy attempt failed.
#[derive(Debug, Clone, Error)]
pub enum StrategyError {
    /// Browser runtime missing, disabled, or failed to launch
    #[error("browser runtime unavailable: {0}")]
    DriverUnavailable(String),

    /// Render never completed within the configured bound
    #[error("render timed out after {after:?}: {detail}")]
    RenderTimeout { after: Duration, detail: String },

    /// HTTP transport failure or non-success status
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response carried no usable content
    #[error("empty content from {url}")]
    EmptyContent { url: String },

    /// No probed endpoint returned a usable structured payload
    #[error("no usable endpoint (probed {probed})")]
    EndpointUnavailable { probed: usize },

    /// The per-attempt timeout elapsed
    #[error("{strategy} attempt exceeded {after:?}")]
    AttemptTimeout {
        strategy: StrategyKind,
        after: Duration,
    },
}

impl StrategyError {
    pub(crate) fn network(err: impl std::fmt::Display) -> Self {
        Self::NetworkError(err.to_string())
    }
}

/// Result type alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Result type alias for strategy attempts.
pub type StrategyResult<T> = std::result::Result<T, StrategyError>;
