//! Structured-data endpoints behind the search application.
//!
//! The search page loads its results from a JSON endpoint. This strategy
//! calls that endpoint directly with XHR-style headers, then falls back to a
//! list of guessed endpoints (GET with query parameters, then POST with a
//! JSON body). The first response with a usable shape wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{StrategyError, StrategyResult};
use crate::pipeline::extract::is_usable_structure;
use crate::pipeline::throttle::Throttle;
use crate::traits::strategy::RetrievalStrategy;
use crate::types::config::ScraperConfig;
use crate::types::payload::{RawPayload, StrategyKind, StrategyOutcome};
use crate::types::query::SearchQuery;

/// One request to try.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    Get {
        url: String,
        params: Vec<(String, String)>,
    },
    Post {
        url: String,
        body: Value,
    },
}

impl Probe {
    pub fn url(&self) -> &str {
        match self {
            Self::Get { url, .. } | Self::Post { url, .. } => url,
        }
    }

    fn method(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::Post { .. } => "POST",
        }
    }
}

/// Probes structured endpoints for a usable JSON payload.
pub struct HiddenApiStrategy {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    json_search_path: Option<String>,
    api_paths: Vec<String>,
    page_size: usize,
    max_results: usize,
    request_timeout: Duration,
    throttle: Arc<Throttle>,
}

impl HiddenApiStrategy {
    pub fn new(config: &ScraperConfig, client: reqwest::Client, throttle: Arc<Throttle>) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            headers: config.headers.api_headers(&config.search_referer()),
            json_search_path: config.json_search_path.clone(),
            api_paths: config.api_paths.clone(),
            page_size: config.api_page_size.max(1),
            max_results: config.max_rulings.unwrap_or(100),
            request_timeout: config.timeouts.api_request,
            throttle,
        }
    }

    /// Requests to try for a query, in order.
    pub fn probes(&self, query: &SearchQuery) -> Vec<Probe> {
        let mut probes = Vec::new();

        if let Some(path) = &self.json_search_path {
            let terms = match query.extra_filter() {
                Some(extra) => format!("{} {extra}", query.keyword()),
                None => query.keyword().to_string(),
            };
            probes.push(Probe::Get {
                url: self.endpoint(path),
                params: vec![
                    ("searchOption".into(), "texto".into()),
                    ("fini".into(), query.start_str()),
                    ("ffin".into(), query.end_str()),
                    ("excluir".into(), String::new()),
                    ("buscar_por".into(), terms),
                    ("maxprov".into(), self.max_results.to_string()),
                    ("slop".into(), "1".into()),
                    ("accion".into(), "search".into()),
                    ("tipo".into(), "json".into()),
                ],
            });
        }

        let keyword = query.keyword().to_string();
        let page = query.page_index() as usize;
        let params: Vec<(String, String)> = vec![
            ("fecha_inicio".into(), query.start_str()),
            ("fecha_fin".into(), query.end_str()),
            ("palabra".into(), keyword.clone()),
            ("texto".into(), keyword.clone()),
            ("q".into(), keyword),
            ("pagina".into(), page.to_string()),
            ("page".into(), page.to_string()),
            ("limit".into(), self.page_size.to_string()),
            ("offset".into(), page.saturating_mul(self.page_size).to_string()),
        ];
        let body = json!({
            "fecha_inicio": query.start_str(),
            "fecha_fin": query.end_str(),
            "palabra": query.keyword().as_str(),
            "texto": query.keyword().as_str(),
            "q": query.keyword().as_str(),
            "pagina": page,
            "page": page,
            "limit": self.page_size,
            "offset": page.saturating_mul(self.page_size),
        });

        for path in &self.api_paths {
            let url = self.endpoint(path);
            probes.push(Probe::Get {
                url: url.clone(),
                params: params.clone(),
            });
            probes.push(Probe::Post {
                url,
                body: body.clone(),
            });
        }

        probes
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Send one probe. `Ok(None)` means the endpoint answered with nothing usable.
    pub async fn send(&self, probe: &Probe) -> StrategyResult<Option<Value>> {
        let request = match probe {
            Probe::Get { url, params } => self.client.get(url).query(params),
            Probe::Post { url, body } => self.client.post(url).json(body),
        };

        let response = request
            .headers(self.headers.clone())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(StrategyError::network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StrategyError::NetworkError(format!(
                "HTTP {status} from {}",
                probe.url()
            )));
        }

        let text = response.text().await.map_err(StrategyError::network)?;
        Ok(parse_json_body(&text).filter(is_usable_structure))
    }
}

/// Decode a JSON body, tolerating markup before it and junk after it.
pub fn parse_json_body(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let start = text.find('{').or_else(|| text.find('['))?;
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()
        .and_then(Result::ok)
}

#[async_trait]
impl RetrievalStrategy for HiddenApiStrategy {
    async fn attempt(&self, query: &SearchQuery) -> StrategyOutcome {
        let started = Instant::now();
        let probes = self.probes(query);
        let mut probed = 0usize;

        for probe in &probes {
            self.throttle.acquire().await;
            probed += 1;

            match self.send(probe).await {
                Ok(Some(value)) => {
                    info!(
                        method = probe.method(),
                        url = %probe.url(),
                        probed,
                        "Structured endpoint answered"
                    );
                    return StrategyOutcome::Success(
                        RawPayload::structured(StrategyKind::HiddenApi, probe.url(), value)
                            .with_elapsed(started.elapsed()),
                    );
                }
                Ok(None) => {
                    debug!(method = probe.method(), url = %probe.url(), "No usable payload")
                }
                Err(e) => {
                    debug!(method = probe.method(), url = %probe.url(), error = %e, "Probe failed")
                }
            }
        }

        StrategyOutcome::Failure(StrategyError::EndpointUnavailable { probed })
    }

    fn name(&self) -> &str {
        "hidden-api"
    }
}
