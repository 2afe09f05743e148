//! Test doubles and fixtures.
//!
//! - [`StubServer`] - a local HTTP server with canned routes that records
//!   every request, so network strategies can be tested without the real site
//! - [`failing_search`] / [`slow_search`] - pipelines over scripted strategies
//! - [`LISTING_MARKUP`] - an archive-style results page

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use crate::strategies::mock::{CallLog, CallRecord, ScriptedFallback, ScriptedStrategy};

use crate::pipeline::assemble::ResultAssembler;
use crate::pipeline::extract::PatternExtractor;
use crate::pipeline::orchestrator::StrategyChain;
use crate::search::RulingSearch;
use crate::site;
use crate::types::payload::StrategyKind;

/// A pipeline built entirely from scripted strategies.
pub type ScriptedSearch =
    RulingSearch<ScriptedStrategy, ScriptedStrategy, ScriptedStrategy, ScriptedFallback>;

/// A results page in the shape the archive renders.
pub const LISTING_MARKUP: &str = r#"<html><body>
<div id="resultados">
  <h2>ACCIÓN DE TUTELA</h2>
  <h3>Agencia oficiosa en tutela</h3>
  <ul>
    <li><a href="/relatoria/2025/T-322-25.htm">T-322/25</a></li>
    <li><a href="/relatoria/2021/T-437-21.htm">T-437/21</a> <a href="/relatoria/2021/T-437-21.pdf">PDF</a></li>
  </ul>
  <h2>DERECHO A LA EDUCACIÓN</h2>
  <ul>
    <li><a href="/relatoria/2025/T-322-25.htm">T-322/25</a></li>
    <li>Sentencia T-038/22</li>
  </ul>
</div>
</body></html>"#;

/// Build a pipeline from three fallible strategies and the catalog fallback,
/// all recording into `log`.
pub fn scripted_search(
    browser: ScriptedStrategy,
    static_fetch: ScriptedStrategy,
    hidden_api: ScriptedStrategy,
    log: &CallLog,
) -> ScriptedSearch {
    let chain = StrategyChain::new(
        browser.with_log(log.clone()),
        static_fetch.with_log(log.clone()),
        hidden_api.with_log(log.clone()),
        ScriptedFallback::new(site::BASE_URL).with_log(log.clone()),
        PatternExtractor::new(site::BASE_URL),
    );
    RulingSearch::new(chain, ResultAssembler::new().with_max_rulings(Some(100)))
}

/// A pipeline whose three fallible strategies always fail.
pub fn failing_search(log: &CallLog) -> ScriptedSearch {
    scripted_search(
        ScriptedStrategy::unreachable(StrategyKind::BrowserRender),
        ScriptedStrategy::unreachable(StrategyKind::StaticFetch),
        ScriptedStrategy::unreachable(StrategyKind::HiddenApi),
        log,
    )
}

/// A pipeline whose first strategy answers `LISTING_MARKUP` after `delay`.
pub fn slow_search(log: &CallLog, delay: Duration) -> ScriptedSearch {
    scripted_search(
        ScriptedStrategy::markup(StrategyKind::BrowserRender, LISTING_MARKUP).with_delay(delay),
        ScriptedStrategy::unreachable(StrategyKind::StaticFetch),
        ScriptedStrategy::unreachable(StrategyKind::HiddenApi),
        log,
    )
}

/// A canned response for one path.
#[derive(Debug, Clone)]
pub struct StubRoute {
    pub path: String,
    pub method: Option<String>,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl StubRoute {
    pub fn html(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: None,
            status: 200,
            content_type: "text/html".into(),
            body: body.into(),
        }
    }

    pub fn json(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            content_type: "application/json".into(),
            ..Self::html(path, body)
        }
    }

    /// Only answer this method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    fn matches(&self, method: &str, path: &str) -> bool {
        self.path == path
            && self
                .method
                .as_deref()
                .is_none_or(|m| m.eq_ignore_ascii_case(method))
    }
}

/// A request the stub server received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,

    /// Path and query string
    pub target: String,

    /// Request line and headers, lower-cased
    pub headers: String,

    pub body: String,
}

#[derive(Clone)]
struct StubState {
    routes: Arc<Vec<StubRoute>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Local HTTP server answering canned routes; unknown paths get a 404.
pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: Vec<StubRoute>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new().fallback(answer).with_state(StubState {
            routes: Arc::new(routes),
            requests: Arc::clone(&requests),
        });
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::debug!(error = %e, "Stub server stopped");
            }
        });

        Ok(Self {
            addr,
            requests,
            task,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn answer(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let mut head = format!("{method} {target} HTTP/1.1\r\n");
    for (name, value) in &headers {
        head.push_str(&format!(
            "{}: {}\r\n",
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes())
        ));
    }

    state
        .requests
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(RecordedRequest {
            method: method.to_string(),
            target,
            headers: head.to_lowercase(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });

    match state.routes.iter().find(|r| r.matches(method.as_str(), uri.path())) {
        Some(route) => (
            StatusCode::from_u16(route.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            [(
                header::CONTENT_TYPE,
                format!("{}; charset=utf-8", route.content_type),
            )],
            route.body.clone(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_server_records_and_routes() {
        let server = StubServer::start(vec![
            StubRoute::html("/relatoria/", "<p>T-322/25</p>"),
            StubRoute::json("/api", "{}").method("POST").status(503),
        ])
        .await
        .unwrap();
        let client = reqwest::Client::new();

        let page = client
            .get(format!("{}/relatoria/?q=tutela", server.base_url()))
            .header("Accept-Language", "es-ES")
            .send()
            .await
            .unwrap();
        assert_eq!(page.status().as_u16(), 200);
        assert!(page.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
        assert_eq!(page.text().await.unwrap(), "<p>T-322/25</p>");

        let api = client
            .post(format!("{}/api", server.base_url()))
            .body("{\"page\":1}")
            .send()
            .await
            .unwrap();
        assert_eq!(api.status().as_u16(), 503);

        // Method mismatch falls through to the 404.
        let missing = client.get(format!("{}/api", server.base_url())).send().await.unwrap();
        assert_eq!(missing.status().as_u16(), 404);
        assert_eq!(missing.text().await.unwrap(), "not found");

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, "GET");
        assert_eq!(requests[0].target, "/relatoria/?q=tutela");
        assert!(requests[0].headers.contains("accept-language: es-es"));
        assert_eq!(requests[1].body, "{\"page\":1}");
        assert_eq!(requests[2].target, "/api");
    }
}
