//! Configuration for the search pipeline and its strategies.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};
use crate::site;
use crate::types::payload::StrategyKind;

/// Desktop Chrome user agent the site serves its full application to.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "es-ES,es;q=0.9,en;q=0.8";

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// When false the browser strategy fails immediately with `DriverUnavailable`
    pub enabled: bool,

    /// Explicit browser binary; discovered on `PATH` when unset
    pub path: Option<PathBuf>,

    /// Virtual time the page gets to run its client code
    pub render_budget: Duration,

    /// Upper bound on the browser process itself
    pub render_timeout: Duration,

    /// Text that must appear in the dumped DOM for the render to count
    pub completion_marker: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            render_budget: Duration::from_secs(5),
            render_timeout: Duration::from_secs(25),
            completion_marker: Some("<body".to_string()),
        }
    }
}

/// Per-attempt and per-request time bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyTimeouts {
    pub browser: Duration,
    pub static_fetch: Duration,

    /// Bound on the whole endpoint probe sequence
    pub hidden_api: Duration,

    /// Bound on each single endpoint request
    pub api_request: Duration,
}

impl Default for StrategyTimeouts {
    fn default() -> Self {
        Self {
            browser: Duration::from_secs(30),
            static_fetch: Duration::from_secs(30),
            hidden_api: Duration::from_secs(60),
            api_request: Duration::from_secs(15),
        }
    }
}

impl StrategyTimeouts {
    /// Attempt bound for a strategy. The fallback is never bounded.
    pub fn for_strategy(&self, kind: StrategyKind) -> Option<Duration> {
        match kind {
            StrategyKind::BrowserRender => Some(self.browser),
            StrategyKind::StaticFetch => Some(self.static_fetch),
            StrategyKind::HiddenApi => Some(self.hidden_api),
            StrategyKind::DeterministicFallback => None,
        }
    }
}

/// Browser-like request headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderProfile {
    pub user_agent: String,
    pub accept_language: String,

    /// Extra headers sent with every request
    #[serde(default)]
    pub extra: Vec<(String, String)>,
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            extra: vec![("Upgrade-Insecure-Requests".to_string(), "1".to_string())],
        }
    }
}

impl HeaderProfile {
    /// Headers for a top-level page navigation.
    pub fn page_headers(&self) -> HeaderMap {
        let mut headers = self.base_headers();
        insert(
            &mut headers,
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        );
        for (name, value) in &self.extra {
            insert(&mut headers, name, value);
        }
        headers
    }

    /// Headers mimicking the search application's own XHR calls.
    pub fn api_headers(&self, referer: &str) -> HeaderMap {
        let mut headers = self.base_headers();
        insert(&mut headers, "Accept", "application/json, text/plain, */*");
        insert(&mut headers, "X-Requested-With", "XMLHttpRequest");
        insert(&mut headers, "Referer", referer);
        headers
    }

    fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert(&mut headers, "User-Agent", &self.user_agent);
        insert(&mut headers, "Accept-Language", &self.accept_language);
        headers
    }
}

// Invalid names or values are skipped rather than failing the request.
fn insert(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => tracing::debug!(header = %name, "Skipping invalid header"),
    }
}

/// Configuration for the whole search pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Site root every request and generated link is built from
    pub base_url: String,

    pub browser: BrowserConfig,

    pub timeouts: StrategyTimeouts,

    /// Minimum spacing between outbound requests
    pub min_request_interval: Duration,

    pub headers: HeaderProfile,

    /// Guessed endpoints probed after the known JSON search
    pub api_paths: Vec<String>,

    /// The site's JSON search endpoint; probing it can be disabled with `None`
    pub json_search_path: Option<String>,

    /// Page size asked of the JSON search endpoint
    pub api_page_size: usize,

    /// Concurrent searches allowed by `SearchPool`
    pub workers: usize,

    /// Cap on the total number of rulings in a result
    pub max_rulings: Option<usize>,

    /// Static responses shorter than this (trimmed, in bytes) count as empty
    pub min_content_length: usize,

    /// Bytes scanned around each ruling code for links and headings
    pub context_window: usize,

    /// Treat a successful payload with no rulings as a failed attempt
    pub advance_on_empty: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: site::BASE_URL.to_string(),
            browser: BrowserConfig::default(),
            timeouts: StrategyTimeouts::default(),
            min_request_interval: Duration::from_secs(1),
            headers: HeaderProfile::default(),
            api_paths: site::API_PATHS.iter().map(|p| p.to_string()).collect(),
            json_search_path: Some(site::JSON_SEARCH_PATH.to_string()),
            api_page_size: 25,
            workers: 4,
            max_rulings: Some(100),
            min_content_length: 100,
            context_window: 4000,
            advance_on_empty: true,
        }
    }
}

impl ScraperConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the environment (and `.env` if present).
    ///
    /// Unset variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> SearchResult<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, applying the same rules as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SearchResult<Self> {
        let mut config = Self::default();

        if let Some(base) = lookup("RELATORIA_BASE_URL") {
            config.base_url = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, "RELATORIA_BROWSER_ENABLED")? {
            config.browser.enabled = enabled;
        }
        if let Some(path) = lookup("RELATORIA_BROWSER_PATH").filter(|p| !p.trim().is_empty()) {
            config.browser.path = Some(PathBuf::from(path.trim()));
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "RELATORIA_RENDER_BUDGET_MS")? {
            config.browser.render_budget = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "RELATORIA_BROWSER_TIMEOUT_SECS")? {
            config.timeouts.browser = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "RELATORIA_STATIC_TIMEOUT_SECS")? {
            config.timeouts.static_fetch = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "RELATORIA_API_TIMEOUT_SECS")? {
            config.timeouts.api_request = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "RELATORIA_MIN_INTERVAL_MS")? {
            config.min_request_interval = Duration::from_millis(ms);
        }
        if let Some(agent) = lookup("RELATORIA_USER_AGENT").filter(|a| !a.trim().is_empty()) {
            config.headers.user_agent = agent.trim().to_string();
        }
        if let Some(workers) = parse_var::<usize>(&lookup, "RELATORIA_WORKERS")? {
            if workers == 0 {
                return Err(SearchError::Config {
                    key: "RELATORIA_WORKERS".into(),
                    reason: "must be at least 1".into(),
                });
            }
            config.workers = workers;
        }
        if let Some(max) = parse_var::<usize>(&lookup, "RELATORIA_MAX_RULINGS")? {
            config.max_rulings = (max > 0).then_some(max);
        }

        Ok(config)
    }

    /// Set the site root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Enable or disable the browser strategy.
    pub fn with_browser_enabled(mut self, enabled: bool) -> Self {
        self.browser.enabled = enabled;
        self
    }

    /// Use a specific browser binary.
    pub fn with_browser_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.browser.path = Some(path.into());
        self
    }

    /// Set the per-strategy timeouts.
    pub fn with_timeouts(mut self, timeouts: StrategyTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the minimum spacing between outbound requests.
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// Replace the guessed endpoint list.
    pub fn with_api_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.api_paths = paths.into_iter().map(|p| p.into()).collect();
        self
    }

    /// Set or disable the known JSON search endpoint.
    pub fn with_json_search_path(mut self, path: Option<String>) -> Self {
        self.json_search_path = path;
        self
    }

    /// Set the worker count (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Cap the number of rulings returned.
    pub fn with_max_rulings(mut self, max: Option<usize>) -> Self {
        self.max_rulings = max;
        self
    }

    /// Set the minimum static response length.
    pub fn with_min_content_length(mut self, bytes: usize) -> Self {
        self.min_content_length = bytes;
        self
    }

    /// Set whether an empty extraction advances the chain.
    pub fn with_advance_on_empty(mut self, advance: bool) -> Self {
        self.advance_on_empty = advance;
        self
    }

    /// Referer used by structured-data probes.
    pub fn search_referer(&self) -> String {
        format!("{}{}", self.base_url, site::SEARCH_REFERER_PATH)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> SearchResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SearchError::Config {
                key: key.to_string(),
                reason: format!("'{}': {}", raw.trim(), e),
            }),
    }
}
