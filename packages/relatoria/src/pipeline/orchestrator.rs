//! The strategy chain - ordered attempts with fallback.
//!
//! ```text
//! Pending -> Attempting(browser-render) -> Attempting(static-fetch)
//!         -> Attempting(hidden-api) -> Attempting(deterministic-fallback)
//!                        \ any success -> Succeeded(kind)
//! ```
//!
//! Each fallible attempt is bounded by its per-strategy timeout. A failure,
//! timeout or (by default) a payload with no rulings moves the chain on to
//! the next strategy. The last slot is a [`FallbackStrategy`], which cannot
//! fail, so a run always ends in `Succeeded`.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::StrategyError;
use crate::pipeline::extract::PatternExtractor;
use crate::traits::strategy::{FallbackStrategy, RetrievalStrategy};
use crate::types::config::StrategyTimeouts;
use crate::types::payload::{StrategyKind, StrategyOutcome};
use crate::types::query::SearchQuery;
use crate::types::ruling::ExtractedRuling;

/// Where a chain run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Pending,
    Attempting(StrategyKind),
    Succeeded(StrategyKind),
}

/// One attempt within a run.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub strategy: StrategyKind,
    pub elapsed: Duration,
    pub failure: Option<StrategyError>,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Outcome of a full chain run.
#[derive(Debug, Clone)]
pub struct ChainRun {
    /// Flat extractor output of the winning payload
    pub extracted: Vec<ExtractedRuling>,

    /// The strategy whose payload was used
    pub succeeded: StrategyKind,

    /// Every attempt made, in order
    pub attempts: Vec<AttemptRecord>,

    /// Provenance note of the winning payload
    pub note: Option<String>,
}

impl ChainRun {
    /// Strategies attempted, in order.
    pub fn attempted(&self) -> Vec<StrategyKind> {
        self.attempts.iter().map(|a| a.strategy).collect()
    }

    pub fn used_fallback(&self) -> bool {
        self.succeeded == StrategyKind::DeterministicFallback
    }
}

/// Fixed-order chain of the four retrieval strategies.
pub struct StrategyChain<B, S, H, F> {
    browser: B,
    static_fetch: S,
    hidden_api: H,
    fallback: F,
    extractor: PatternExtractor,
    timeouts: StrategyTimeouts,
    advance_on_empty: bool,
}

impl<B, S, H, F> StrategyChain<B, S, H, F>
where
    B: RetrievalStrategy,
    S: RetrievalStrategy,
    H: RetrievalStrategy,
    F: FallbackStrategy,
{
    pub fn new(browser: B, static_fetch: S, hidden_api: H, fallback: F, extractor: PatternExtractor) -> Self {
        Self {
            browser,
            static_fetch,
            hidden_api,
            fallback,
            extractor,
            timeouts: StrategyTimeouts::default(),
            advance_on_empty: true,
        }
    }

    /// Set the per-attempt timeouts.
    pub fn with_timeouts(mut self, timeouts: StrategyTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set whether a payload without rulings counts as a failed attempt.
    pub fn with_advance_on_empty(mut self, advance: bool) -> Self {
        self.advance_on_empty = advance;
        self
    }

    pub fn extractor(&self) -> &PatternExtractor {
        &self.extractor
    }

    fn slot(&self, kind: StrategyKind) -> Option<&dyn RetrievalStrategy> {
        match kind {
            StrategyKind::BrowserRender => Some(&self.browser),
            StrategyKind::StaticFetch => Some(&self.static_fetch),
            StrategyKind::HiddenApi => Some(&self.hidden_api),
            StrategyKind::DeterministicFallback => None,
        }
    }

    async fn bounded_attempt(
        &self,
        kind: StrategyKind,
        strategy: &dyn RetrievalStrategy,
        query: &SearchQuery,
    ) -> StrategyOutcome {
        match self.timeouts.for_strategy(kind) {
            Some(bound) => match tokio::time::timeout(bound, strategy.attempt(query)).await {
                Ok(outcome) => outcome,
                Err(_) => StrategyOutcome::Failure(StrategyError::AttemptTimeout {
                    strategy: kind,
                    after: bound,
                }),
            },
            None => strategy.attempt(query).await,
        }
    }

    /// Run the chain for a validated query.
    pub async fn run(&self, query: &SearchQuery) -> ChainRun {
        let mut state = ChainState::Pending;
        let mut attempts = Vec::with_capacity(StrategyKind::PRIORITY.len());

        for kind in StrategyKind::FALLIBLE {
            let Some(strategy) = self.slot(kind) else {
                continue;
            };
            transition(&mut state, ChainState::Attempting(kind));

            let started = Instant::now();
            let outcome = self.bounded_attempt(kind, strategy, query).await;
            let elapsed = started.elapsed();

            let failure = match outcome {
                StrategyOutcome::Success(payload) => {
                    let extracted = self.extractor.extract(&payload);
                    if extracted.is_empty() && self.advance_on_empty {
                        StrategyError::EmptyContent {
                            url: payload.source_url,
                        }
                    } else {
                        info!(
                            strategy = %kind,
                            elapsed_ms = elapsed.as_millis() as u64,
                            rulings = extracted.len(),
                            "Strategy succeeded"
                        );
                        attempts.push(AttemptRecord {
                            strategy: kind,
                            elapsed,
                            failure: None,
                        });
                        transition(&mut state, ChainState::Succeeded(kind));
                        return ChainRun {
                            extracted,
                            succeeded: kind,
                            attempts,
                            note: payload.note,
                        };
                    }
                }
                StrategyOutcome::Failure(err) => err,
            };

            warn!(
                strategy = %kind,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %failure,
                "Strategy failed, advancing"
            );
            attempts.push(AttemptRecord {
                strategy: kind,
                elapsed,
                failure: Some(failure),
            });
        }

        let kind = StrategyKind::DeterministicFallback;
        transition(&mut state, ChainState::Attempting(kind));
        let started = Instant::now();
        let payload = self.fallback.synthesize(query).await;
        let extracted = self.extractor.extract(&payload);
        let elapsed = started.elapsed();

        info!(
            strategy = %kind,
            elapsed_ms = elapsed.as_millis() as u64,
            rulings = extracted.len(),
            note = payload.note.as_deref().unwrap_or(""),
            "Fallback produced result"
        );
        attempts.push(AttemptRecord {
            strategy: kind,
            elapsed,
            failure: None,
        });
        transition(&mut state, ChainState::Succeeded(kind));

        ChainRun {
            extracted,
            succeeded: kind,
            attempts,
            note: payload.note,
        }
    }
}

fn transition(state: &mut ChainState, next: ChainState) {
    debug!(from = ?state, to = ?next, "Chain transition");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::mock::{CallLog, ScriptedFallback, ScriptedStrategy};

    const BASE: &str = "https://www.corteconstitucional.gov.co";

    fn query() -> SearchQuery {
        SearchQuery::new("2025-01-01", "2025-06-30", "agente oficioso", None, 0).unwrap()
    }

    fn chain(
        browser: ScriptedStrategy,
        static_fetch: ScriptedStrategy,
        hidden_api: ScriptedStrategy,
        log: &CallLog,
    ) -> StrategyChain<ScriptedStrategy, ScriptedStrategy, ScriptedStrategy, ScriptedFallback> {
        StrategyChain::new(
            browser.with_log(log.clone()),
            static_fetch.with_log(log.clone()),
            hidden_api.with_log(log.clone()),
            ScriptedFallback::new(BASE).with_log(log.clone()),
            PatternExtractor::new(BASE),
        )
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let log = CallLog::new();
        let chain = chain(
            ScriptedStrategy::unreachable(StrategyKind::BrowserRender),
            ScriptedStrategy::markup(StrategyKind::StaticFetch, "<h2>SALUD</h2><p>T-1/20</p>"),
            ScriptedStrategy::unreachable(StrategyKind::HiddenApi),
            &log,
        );

        let run = chain.run(&query()).await;
        assert_eq!(run.succeeded, StrategyKind::StaticFetch);
        assert_eq!(log.calls(), vec![StrategyKind::BrowserRender, StrategyKind::StaticFetch]);
        assert_eq!(run.extracted.len(), 1);
        assert!(!run.attempts[0].succeeded());
        assert!(run.attempts[1].succeeded());
    }

    #[tokio::test]
    async fn test_all_failures_reach_fallback_in_order() {
        let log = CallLog::new();
        let chain = chain(
            ScriptedStrategy::failing(
                StrategyKind::BrowserRender,
                StrategyError::DriverUnavailable("none".into()),
            ),
            ScriptedStrategy::unreachable(StrategyKind::StaticFetch),
            ScriptedStrategy::failing(
                StrategyKind::HiddenApi,
                StrategyError::EndpointUnavailable { probed: 3 },
            ),
            &log,
        );

        let run = chain.run(&query()).await;
        assert!(run.used_fallback());
        assert_eq!(log.calls(), StrategyKind::PRIORITY.to_vec());
        assert_eq!(run.attempted(), StrategyKind::PRIORITY.to_vec());
        assert_eq!(run.note.as_deref(), Some(crate::strategies::fallback::BEST_EFFORT_NOTE));
        assert!(!run.extracted.is_empty());
    }

    #[tokio::test]
    async fn test_empty_payload_advances_by_default() {
        let log = CallLog::new();
        let chain = chain(
            ScriptedStrategy::markup(StrategyKind::BrowserRender, "<html><body>cargando</body></html>"),
            ScriptedStrategy::markup(StrategyKind::StaticFetch, "<p>C-10/21</p>"),
            ScriptedStrategy::unreachable(StrategyKind::HiddenApi),
            &log,
        );

        let run = chain.run(&query()).await;
        assert_eq!(run.succeeded, StrategyKind::StaticFetch);
        assert!(matches!(
            run.attempts[0].failure,
            Some(StrategyError::EmptyContent { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_payload_accepted_when_configured() {
        let log = CallLog::new();
        let chain = chain(
            ScriptedStrategy::markup(StrategyKind::BrowserRender, "<html><body>sin resultados</body></html>"),
            ScriptedStrategy::unreachable(StrategyKind::StaticFetch),
            ScriptedStrategy::unreachable(StrategyKind::HiddenApi),
            &log,
        )
        .with_advance_on_empty(false);

        let run = chain.run(&query()).await;
        assert_eq!(run.succeeded, StrategyKind::BrowserRender);
        assert!(run.extracted.is_empty());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out_and_advances() {
        let log = CallLog::new();
        let chain = chain(
            ScriptedStrategy::markup(StrategyKind::BrowserRender, "<p>T-1/20</p>")
                .with_delay(Duration::from_secs(5)),
            ScriptedStrategy::markup(StrategyKind::StaticFetch, "<p>T-2/20</p>"),
            ScriptedStrategy::unreachable(StrategyKind::HiddenApi),
            &log,
        )
        .with_timeouts(StrategyTimeouts {
            browser: Duration::from_millis(50),
            ..StrategyTimeouts::default()
        });

        let run = chain.run(&query()).await;
        assert_eq!(run.succeeded, StrategyKind::StaticFetch);
        assert!(matches!(
            run.attempts[0].failure,
            Some(StrategyError::AttemptTimeout {
                strategy: StrategyKind::BrowserRender,
                ..
            })
        ));
        assert_eq!(run.extracted[0].record.identifier, "T-2/20");
    }
}
