//! Search entry points.
//!
//! [`RulingSearch`] ties the strategy chain to the result assembler and
//! exposes the pipeline two ways:
//! - [`RulingSearch::search`] for async callers
//! - [`RulingSearch::search_blocking`] for synchronous callers, which runs the
//!   same pipeline on a private current-thread runtime
//!
//! For concurrent callers that must not block, see [`crate::pool::SearchPool`].

use tracing::info;

use crate::error::{SearchError, SearchResult};
use crate::pipeline::assemble::ResultAssembler;
use crate::pipeline::extract::PatternExtractor;
use crate::pipeline::orchestrator::StrategyChain;
use crate::pipeline::throttle::Throttle;
use crate::strategies::{
    build_client, BrowserRenderStrategy, DeterministicFallbackStrategy, HiddenApiStrategy,
    StaticFetchStrategy,
};
use crate::traits::strategy::{FallbackStrategy, RetrievalStrategy};
use crate::types::config::ScraperConfig;
use crate::types::query::{SearchParams, SearchQuery};
use crate::types::ruling::ExtractionResult;

/// The full search pipeline over a strategy chain.
pub struct RulingSearch<B, S, H, F> {
    chain: StrategyChain<B, S, H, F>,
    assembler: ResultAssembler,
}

/// The pipeline wired to the real site.
pub type LiveRulingSearch = RulingSearch<
    BrowserRenderStrategy,
    StaticFetchStrategy,
    HiddenApiStrategy,
    DeterministicFallbackStrategy,
>;

impl<B, S, H, F> RulingSearch<B, S, H, F>
where
    B: RetrievalStrategy,
    S: RetrievalStrategy,
    H: RetrievalStrategy,
    F: FallbackStrategy,
{
    pub fn new(chain: StrategyChain<B, S, H, F>, assembler: ResultAssembler) -> Self {
        Self { chain, assembler }
    }

    pub fn chain(&self) -> &StrategyChain<B, S, H, F> {
        &self.chain
    }

    /// Validate the parameters and run the pipeline.
    ///
    /// Only `InvalidQuery` can come back as an error; every valid query
    /// yields a result.
    pub async fn search(&self, params: &SearchParams) -> SearchResult<ExtractionResult> {
        let query = SearchQuery::try_from(params)?;
        Ok(self.run_query(&query).await)
    }

    /// Run the pipeline for an already validated query.
    pub async fn run_query(&self, query: &SearchQuery) -> ExtractionResult {
        let run = self.chain.run(query).await;
        let strategy = run.succeeded;
        let attempts = run.attempts.len();
        let result = self.assembler.assemble(run.extracted);

        info!(
            start = %query.start_date(),
            end = %query.end_date(),
            keyword = %query.keyword(),
            strategy = %strategy,
            attempts,
            groups = result.len(),
            rulings = result.total_rulings(),
            "Search completed"
        );
        result
    }

    /// Run the pipeline on the caller's thread.
    ///
    /// Builds a current-thread runtime for the duration of the call. Called
    /// from inside an async context it returns [`SearchError::Runtime`]
    /// instead of blocking a runtime worker; use [`RulingSearch::search`] or
    /// the pool there.
    pub fn search_blocking(&self, params: &SearchParams) -> SearchResult<ExtractionResult> {
        let query = SearchQuery::try_from(params)?;
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(SearchError::Runtime(std::io::Error::other(
                "search_blocking called from within an async runtime",
            )));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.run_query(&query)))
    }
}

impl LiveRulingSearch {
    /// Wire the four real strategies from a config.
    ///
    /// All outbound strategies share one throttle and one HTTP client.
    pub fn from_config(config: &ScraperConfig) -> SearchResult<Self> {
        let throttle = Throttle::shared(config.min_request_interval);
        let client = build_client(config)?;

        let chain = StrategyChain::new(
            BrowserRenderStrategy::new(config, throttle.clone()),
            StaticFetchStrategy::new(config, client.clone(), throttle.clone()),
            HiddenApiStrategy::new(config, client, throttle),
            DeterministicFallbackStrategy::new(config.base_url.clone()),
            PatternExtractor::new(config.base_url.clone()).with_context_window(config.context_window),
        )
        .with_timeouts(config.timeouts.clone())
        .with_advance_on_empty(config.advance_on_empty);

        Ok(Self::new(
            chain,
            ResultAssembler::new().with_max_rulings(config.max_rulings),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{failing_search, CallLog};

    #[test]
    fn test_blocking_search_rejects_before_any_strategy() {
        let log = CallLog::new();
        let search = failing_search(&log);
        let params = SearchParams::new("2025-02-01", "2025-01-01", "tutela");

        let err = search.search_blocking(&params).unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery { .. }));
        assert!(log.is_empty());
    }

    #[test]
    fn test_blocking_search_falls_back() {
        let log = CallLog::new();
        let search = failing_search(&log);
        let params = SearchParams::new("1992-01-01", "2025-08-17", "agente oficioso");

        let result = search.search_blocking(&params).unwrap();
        assert_eq!(result.groups()[0].topic, "ACCIÓN DE TUTELA POR AGENTE OFICIOSO");
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn test_blocking_search_refuses_inside_runtime() {
        let log = CallLog::new();
        let search = failing_search(&log);
        let params = SearchParams::new("1992-01-01", "2025-08-17", "agente oficioso");

        let err = search.search_blocking(&params).unwrap_err();
        assert!(matches!(err, SearchError::Runtime(_)));
        assert!(log.is_empty());

        // The async entry point still works on the same runtime.
        assert!(!search.search(&params).await.unwrap().is_empty());
    }

    #[test]
    fn test_live_search_builds_from_config() {
        let config = ScraperConfig::default().with_browser_enabled(false);
        assert!(LiveRulingSearch::from_config(&config).is_ok());
    }
}
