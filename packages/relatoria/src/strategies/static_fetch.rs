//! Plain HTTP retrieval of the search page.
//!
//! Fetches the search application's URL with browser-like headers and returns
//! whatever markup the server sends, without running any client code.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StrategyError, StrategyResult};
use crate::pipeline::throttle::Throttle;
use crate::traits::strategy::RetrievalStrategy;
use crate::types::config::ScraperConfig;
use crate::types::payload::{RawPayload, StrategyKind, StrategyOutcome};
use crate::types::query::SearchQuery;

/// Result of a connectivity probe against the site root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub url: String,
    pub status: u16,
    pub content_length: usize,
    pub reachable: bool,
}

/// Direct HTTP GET of the search page.
pub struct StaticFetchStrategy {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    timeout: Duration,
    min_content_length: usize,
    throttle: Arc<Throttle>,
}

impl StaticFetchStrategy {
    pub fn new(config: &ScraperConfig, client: reqwest::Client, throttle: Arc<Throttle>) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            headers: config.headers.page_headers(),
            timeout: config.timeouts.static_fetch,
            min_content_length: config.min_content_length,
            throttle,
        }
    }

    /// GET `url` and return its body.
    pub async fn fetch(&self, url: &str) -> StrategyResult<String> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "HTTP request failed");
                StrategyError::network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StrategyError::NetworkError(format!("HTTP {status} from {url}")));
        }

        let body = response.text().await.map_err(StrategyError::network)?;
        if body.trim().len() < self.min_content_length {
            return Err(StrategyError::EmptyContent {
                url: url.to_string(),
            });
        }
        Ok(body)
    }

    /// GET the site root and report what came back.
    pub async fn check_connectivity(&self) -> StrategyResult<ConnectivityReport> {
        let url = format!("{}/", self.base_url);
        self.throttle.acquire().await;

        let response = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(StrategyError::network)?;

        let status = response.status();
        let body = response.text().await.map_err(StrategyError::network)?;
        let report = ConnectivityReport {
            url,
            status: status.as_u16(),
            content_length: body.len(),
            reachable: status.is_success(),
        };
        info!(
            url = %report.url,
            status = report.status,
            content_length = report.content_length,
            "Connectivity check"
        );
        Ok(report)
    }
}

#[async_trait]
impl RetrievalStrategy for StaticFetchStrategy {
    async fn attempt(&self, query: &SearchQuery) -> StrategyOutcome {
        let started = Instant::now();
        let url = query.search_url(&self.base_url);
        self.throttle.acquire().await;

        self.fetch(&url)
            .await
            .map(|body| {
                RawPayload::markup(StrategyKind::StaticFetch, &url, body).with_elapsed(started.elapsed())
            })
            .into()
    }

    fn name(&self) -> &str {
        "static-fetch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::build_client;
    use crate::testing::{StubRoute, StubServer};

    fn query() -> SearchQuery {
        SearchQuery::new("2025-01-01", "2025-01-31", "agente oficioso", None, 0).unwrap()
    }

    fn strategy(base_url: &str) -> StaticFetchStrategy {
        let config = ScraperConfig::default()
            .with_base_url(base_url)
            .with_min_request_interval(Duration::ZERO);
        let client = build_client(&config).unwrap();
        StaticFetchStrategy::new(&config, client, Throttle::unlimited())
    }

    #[tokio::test]
    async fn test_fetches_search_page_with_browser_headers() {
        let page = format!("<html><body><p>T-322/25</p>{}</body></html>", " ".repeat(10) + &"x".repeat(200));
        let server = StubServer::start(vec![StubRoute::html(
            "/relatoria/buscador-jurisprudencia/texto/2025-01-01/2025-01-31/agente%20oficioso//0",
            &page,
        )])
        .await
        .unwrap();

        let outcome = strategy(&server.base_url()).attempt(&query()).await;
        let payload = outcome.into_result().unwrap();
        assert_eq!(payload.strategy, StrategyKind::StaticFetch);
        assert!(payload.source_url.ends_with("/agente%20oficioso//0"));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.contains("chrome/121"));
        assert!(requests[0].headers.contains("es-es,es;q=0.9"));
    }

    #[tokio::test]
    async fn test_short_body_is_empty_content() {
        let server = StubServer::start(vec![StubRoute::html(
            "/relatoria/buscador-jurisprudencia/texto/2025-01-01/2025-01-31/agente%20oficioso//0",
            "<html></html>",
        )])
        .await
        .unwrap();

        match strategy(&server.base_url()).attempt(&query()).await {
            StrategyOutcome::Failure(StrategyError::EmptyContent { .. }) => {}
            other => panic!("expected EmptyContent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_network_error() {
        let server = StubServer::start(vec![]).await.unwrap();
        match strategy(&server.base_url()).attempt(&query()).await {
            StrategyOutcome::Failure(StrategyError::NetworkError(msg)) => assert!(msg.contains("404")),
            other => panic!("expected NetworkError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connectivity_report() {
        let server = StubServer::start(vec![StubRoute::html("/", "<html>home</html>")])
            .await
            .unwrap();
        let report = strategy(&server.base_url()).check_connectivity().await.unwrap();
        assert!(report.reachable);
        assert_eq!(report.status, 200);
        assert_eq!(report.content_length, "<html>home</html>".len());
    }
}
