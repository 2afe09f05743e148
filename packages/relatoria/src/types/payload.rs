//! Strategy identities and the raw payloads they produce.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StrategyError, StrategyResult};

/// Identity of a retrieval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    BrowserRender,
    StaticFetch,
    HiddenApi,
    DeterministicFallback,
}

impl StrategyKind {
    /// Fixed attempt order.
    pub const PRIORITY: [StrategyKind; 4] = [
        StrategyKind::BrowserRender,
        StrategyKind::StaticFetch,
        StrategyKind::HiddenApi,
        StrategyKind::DeterministicFallback,
    ];

    /// The strategies that can fail, in attempt order.
    pub const FALLIBLE: [StrategyKind; 3] = [
        StrategyKind::BrowserRender,
        StrategyKind::StaticFetch,
        StrategyKind::HiddenApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrowserRender => "browser-render",
            Self::StaticFetch => "static-fetch",
            Self::HiddenApi => "hidden-api",
            Self::DeterministicFallback => "deterministic-fallback",
        }
    }

    /// Whether attempts of this kind talk to the target site.
    pub fn is_outbound(&self) -> bool {
        !matches!(self, Self::DeterministicFallback)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page markup or a decoded structured response.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadBody {
    Markup(String),
    Structured(serde_json::Value),
}

/// What one successful strategy attempt produced.
///
/// Lives only between the attempt and extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    pub strategy: StrategyKind,
    pub source_url: String,
    pub body: PayloadBody,
    pub elapsed: Duration,

    /// Provenance note, e.g. the fallback marks its output best-effort
    pub note: Option<String>,
}

impl RawPayload {
    pub fn markup(strategy: StrategyKind, source_url: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            strategy,
            source_url: source_url.into(),
            body: PayloadBody::Markup(markup.into()),
            elapsed: Duration::ZERO,
            note: None,
        }
    }

    pub fn structured(
        strategy: StrategyKind,
        source_url: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            strategy,
            source_url: source_url.into(),
            body: PayloadBody::Structured(value),
            elapsed: Duration::ZERO,
            note: None,
        }
    }

    /// Set the elapsed time.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Set the provenance note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Result of one attempt, as seen by the orchestrator.
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    Success(RawPayload),
    Failure(StrategyError),
}

impl StrategyOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> StrategyResult<RawPayload> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Failure(err) => Err(err),
        }
    }
}

impl From<StrategyResult<RawPayload>> for StrategyOutcome {
    fn from(result: StrategyResult<RawPayload>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(err) => Self::Failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_and_names() {
        let names: Vec<_> = StrategyKind::PRIORITY.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            names,
            ["browser-render", "static-fetch", "hidden-api", "deterministic-fallback"]
        );
        assert_eq!(&StrategyKind::PRIORITY[..3], &StrategyKind::FALLIBLE[..]);
        assert!(!StrategyKind::DeterministicFallback.is_outbound());
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: StrategyResult<RawPayload> =
            Ok(RawPayload::markup(StrategyKind::StaticFetch, "http://x", "<p>"));
        assert!(StrategyOutcome::from(ok).is_success());

        let err: StrategyResult<RawPayload> = Err(StrategyError::EmptyContent { url: "http://x".into() });
        assert!(StrategyOutcome::from(err).into_result().is_err());
    }
}
