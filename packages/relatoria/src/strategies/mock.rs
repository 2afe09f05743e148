//! Scripted strategies for testing.
//!
//! Provides configurable implementations of both strategy traits that return
//! canned outcomes and record every call in a shared [`CallLog`].

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::StrategyError;
use crate::pipeline::throttle::Throttle;
use crate::strategies::fallback::DeterministicFallbackStrategy;
use crate::traits::strategy::{FallbackStrategy, RetrievalStrategy};
use crate::types::payload::{RawPayload, StrategyKind, StrategyOutcome};
use crate::types::query::SearchQuery;

/// One recorded strategy call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    pub strategy: StrategyKind,
    pub at: Instant,
}

/// Shared, ordered record of strategy calls.
///
/// Clones share the same log, so one log can be handed to every strategy in
/// a chain and inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<RwLock<Vec<CallRecord>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, strategy: StrategyKind) {
        let mut calls = self.calls.write().unwrap_or_else(|e| e.into_inner());
        calls.push(CallRecord {
            strategy,
            at: Instant::now(),
        });
    }

    /// Strategies called, in order.
    pub fn calls(&self) -> Vec<StrategyKind> {
        self.records().into_iter().map(|r| r.strategy).collect()
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all recorded calls.
    pub fn reset(&self) {
        self.calls.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// A fallible strategy with a canned outcome.
///
/// # Example
///
/// ```rust
/// use relatoria::strategies::mock::{CallLog, ScriptedStrategy};
/// use relatoria::types::payload::StrategyKind;
///
/// let log = CallLog::new();
/// let strategy = ScriptedStrategy::markup(StrategyKind::StaticFetch, "<p>T-322/25</p>")
///     .with_log(log.clone());
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedStrategy {
    kind: StrategyKind,
    outcome: StrategyOutcome,
    delay: Option<Duration>,
    throttle: Option<Arc<Throttle>>,
    log: CallLog,
}

impl ScriptedStrategy {
    /// Always succeed with this markup.
    pub fn markup(kind: StrategyKind, markup: impl Into<String>) -> Self {
        let payload = RawPayload::markup(kind, format!("scripted://{kind}"), markup);
        Self::with_outcome(kind, StrategyOutcome::Success(payload))
    }

    /// Always succeed with this structured value.
    pub fn structured(kind: StrategyKind, value: serde_json::Value) -> Self {
        let payload = RawPayload::structured(kind, format!("scripted://{kind}"), value);
        Self::with_outcome(kind, StrategyOutcome::Success(payload))
    }

    /// Always fail with this error.
    pub fn failing(kind: StrategyKind, error: StrategyError) -> Self {
        Self::with_outcome(kind, StrategyOutcome::Failure(error))
    }

    /// Always fail with a generic network error.
    pub fn unreachable(kind: StrategyKind) -> Self {
        Self::failing(kind, StrategyError::NetworkError("scripted failure".into()))
    }

    pub fn with_outcome(kind: StrategyKind, outcome: StrategyOutcome) -> Self {
        Self {
            kind,
            outcome,
            delay: None,
            throttle: None,
            log: CallLog::new(),
        }
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Take a throttle slot before answering, like a real outbound strategy.
    pub fn with_throttle(mut self, throttle: Arc<Throttle>) -> Self {
        self.throttle = Some(throttle);
        self
    }

    /// Record calls into a shared log.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

#[async_trait]
impl RetrievalStrategy for ScriptedStrategy {
    async fn attempt(&self, _query: &SearchQuery) -> StrategyOutcome {
        let started = Instant::now();
        if let Some(throttle) = &self.throttle {
            throttle.acquire().await;
        }
        self.log.record(self.kind);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.outcome {
            StrategyOutcome::Success(payload) => {
                StrategyOutcome::Success(payload.clone().with_elapsed(started.elapsed()))
            }
            failure => failure.clone(),
        }
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }
}

/// The deterministic fallback, or fixed markup, with call recording.
#[derive(Debug, Clone)]
pub struct ScriptedFallback {
    inner: DeterministicFallbackStrategy,
    markup: Option<String>,
    log: CallLog,
}

impl ScriptedFallback {
    /// Delegate to the real catalog fallback.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            inner: DeterministicFallbackStrategy::new(base_url),
            markup: None,
            log: CallLog::new(),
        }
    }

    /// Answer with fixed markup instead of the catalog.
    pub fn with_markup(mut self, markup: impl Into<String>) -> Self {
        self.markup = Some(markup.into());
        self
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }
}

#[async_trait]
impl FallbackStrategy for ScriptedFallback {
    async fn synthesize(&self, query: &SearchQuery) -> RawPayload {
        self.log.record(StrategyKind::DeterministicFallback);
        match &self.markup {
            Some(markup) => RawPayload::markup(
                StrategyKind::DeterministicFallback,
                "scripted://deterministic-fallback",
                markup.clone(),
            ),
            None => self.inner.synthesize(query).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_strategy_records_calls() {
        let log = CallLog::new();
        let strategy = ScriptedStrategy::unreachable(StrategyKind::HiddenApi).with_log(log.clone());
        let query = SearchQuery::new("2025-01-01", "2025-01-02", "x", None, 0).unwrap();

        assert!(!strategy.attempt(&query).await.is_success());
        assert!(!strategy.attempt(&query).await.is_success());
        assert_eq!(log.calls(), vec![StrategyKind::HiddenApi, StrategyKind::HiddenApi]);

        log.reset();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_fallback_fixed_markup() {
        let log = CallLog::new();
        let fallback = ScriptedFallback::new("http://x")
            .with_markup("<p>C-1/99</p>")
            .with_log(log.clone());
        let query = SearchQuery::new("2025-01-01", "2025-01-02", "x", None, 0).unwrap();

        let payload = fallback.synthesize(&query).await;
        assert_eq!(payload.body, crate::types::payload::PayloadBody::Markup("<p>C-1/99</p>".into()));
        assert_eq!(log.calls(), vec![StrategyKind::DeterministicFallback]);
    }
}
