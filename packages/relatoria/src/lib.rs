//! Constitutional Court Ruling Search
//!
//! Searches the court's public archive for rulings in a date range matching
//! a keyword, and returns them grouped by topic and sub-topic.
//!
//! # Design
//!
//! The archive is unreliable, so retrieval is a chain of strategies tried in
//! a fixed order until one yields rulings:
//!
//! 1. Headless browser render of the search page
//! 2. Plain HTTP fetch of the same page
//! 3. Probing of known structured endpoints
//! 4. A deterministic catalog fallback, which always answers
//!
//! Whatever payload wins goes through one extractor and one assembler, so
//! the output shape does not depend on which strategy produced it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use relatoria::{LiveRulingSearch, ScraperConfig, SearchParams};
//!
//! let config = ScraperConfig::from_env()?;
//! let search = LiveRulingSearch::from_config(&config)?;
//!
//! let params = SearchParams::new("1992-01-01", "2025-08-17", "agente oficioso");
//! let result = search.search_blocking(&params)?;
//! println!("{}", result.to_json()?);
//! ```
//!
//! # Modules
//!
//! - [`types`] - Queries, payloads, rulings and configuration
//! - [`traits`] - The strategy seams
//! - [`strategies`] - The four retrieval strategies
//! - [`pipeline`] - Orchestration, throttling, extraction and assembly
//! - [`search`] - Blocking and async entry points
//! - [`pool`] - Bounded non-blocking execution
//! - [`testing`] - Stub server and scripted pipelines for tests

pub mod error;
pub mod pipeline;
pub mod pool;
pub mod search;
pub mod site;
pub mod strategies;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{SearchError, SearchResult, StrategyError, StrategyResult};
pub use traits::strategy::{FallbackStrategy, RetrievalStrategy};
pub use types::{
    config::{BrowserConfig, HeaderProfile, ScraperConfig, StrategyTimeouts},
    payload::{PayloadBody, RawPayload, StrategyKind, StrategyOutcome},
    query::{Keyword, SearchParams, SearchQuery},
    ruling::{ExtractedRuling, ExtractionResult, RulingCode, RulingRecord, TopicGroup},
};

// Re-export pipeline components
pub use pipeline::{
    AttemptRecord, ChainRun, ChainState, PatternExtractor, ResultAssembler, StrategyChain,
    Throttle,
};

// Re-export strategies
pub use strategies::{
    BrowserRenderStrategy, ConnectivityReport, DeterministicFallbackStrategy, HiddenApiStrategy,
    StaticFetchStrategy,
};

// Re-export entry points
pub use pool::{SearchHandle, SearchPool};
pub use search::{LiveRulingSearch, RulingSearch};
