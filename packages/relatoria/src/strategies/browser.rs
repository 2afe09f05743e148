//! Headless browser rendering of the client-side search application.
//!
//! Each attempt launches its own Chromium-family process with a throwaway
//! profile directory, lets the page run for a bounded virtual-time budget and
//! reads back the rendered DOM. The process is killed if the attempt is
//! dropped, so a timed-out attempt never leaves a browser behind.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{StrategyError, StrategyResult};
use crate::pipeline::throttle::Throttle;
use crate::traits::strategy::RetrievalStrategy;
use crate::types::config::{BrowserConfig, ScraperConfig};
use crate::types::payload::{RawPayload, StrategyKind, StrategyOutcome};
use crate::types::query::SearchQuery;

/// Binaries looked up on `PATH` when no explicit browser is configured.
pub const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Renders the search page in a headless browser.
pub struct BrowserRenderStrategy {
    config: BrowserConfig,
    base_url: String,
    user_agent: String,
    throttle: Arc<Throttle>,
}

impl BrowserRenderStrategy {
    pub fn new(config: &ScraperConfig, throttle: Arc<Throttle>) -> Self {
        Self {
            config: config.browser.clone(),
            base_url: config.base_url.clone(),
            user_agent: config.headers.user_agent.clone(),
            throttle,
        }
    }

    /// Find the browser binary: the configured path, else the first candidate on `PATH`.
    pub fn locate_browser(&self) -> StrategyResult<PathBuf> {
        if !self.config.enabled {
            return Err(StrategyError::DriverUnavailable(
                "browser rendering disabled by configuration".into(),
            ));
        }

        if let Some(path) = &self.config.path {
            return if path.is_file() {
                Ok(path.clone())
            } else {
                Err(StrategyError::DriverUnavailable(format!(
                    "configured browser not found at {}",
                    path.display()
                )))
            };
        }

        BROWSER_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                StrategyError::DriverUnavailable("no Chromium-family browser found on PATH".into())
            })
    }

    fn command_args(&self, url: &str, profile_dir: &std::path::Path) -> Vec<String> {
        vec![
            "--headless=new".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--window-size=1920,1080".to_string(),
            format!("--user-agent={}", self.user_agent),
            format!(
                "--virtual-time-budget={}",
                self.config.render_budget.as_millis()
            ),
            format!("--user-data-dir={}", profile_dir.display()),
            "--dump-dom".to_string(),
            url.to_string(),
        ]
    }

    /// Render `url` and return the DOM once the completion marker is present.
    pub async fn render(&self, url: &str) -> StrategyResult<String> {
        let browser = self.locate_browser()?;
        let profile = tempfile::Builder::new()
            .prefix("relatoria-profile-")
            .tempdir()
            .map_err(|e| StrategyError::DriverUnavailable(format!("profile directory: {e}")))?;

        debug!(browser = %browser.display(), url = %url, "Launching headless browser");
        let child = Command::new(&browser)
            .args(self.command_args(url, profile.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                StrategyError::DriverUnavailable(format!("failed to start {}: {e}", browser.display()))
            })?;

        let bound = self.config.render_timeout;
        let output = match tokio::time::timeout(bound, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(StrategyError::DriverUnavailable(format!("browser process: {e}")))
            }
            Err(_) => {
                return Err(StrategyError::RenderTimeout {
                    after: bound,
                    detail: "browser did not finish rendering".into(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().next().unwrap_or("no diagnostics").to_string();
            return Err(StrategyError::DriverUnavailable(format!(
                "browser exited with {}: {detail}",
                output.status
            )));
        }

        let dom = String::from_utf8_lossy(&output.stdout).into_owned();
        check_completion(&dom, self.config.completion_marker.as_deref(), bound)?;
        Ok(dom)
    }
}

fn check_completion(dom: &str, marker: Option<&str>, bound: Duration) -> StrategyResult<()> {
    if dom.trim().is_empty() {
        return Err(StrategyError::RenderTimeout {
            after: bound,
            detail: "browser produced no DOM".into(),
        });
    }
    match marker {
        Some(marker) if !dom.contains(marker) => Err(StrategyError::RenderTimeout {
            after: bound,
            detail: format!("completion marker {marker:?} never appeared"),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl RetrievalStrategy for BrowserRenderStrategy {
    async fn attempt(&self, query: &SearchQuery) -> StrategyOutcome {
        let started = Instant::now();
        // Fail fast before taking a throttle slot when there is nothing to launch.
        if let Err(err) = self.locate_browser() {
            return StrategyOutcome::Failure(err);
        }

        let url = query.search_url(&self.base_url);
        self.throttle.acquire().await;

        let outcome = self.render(&url).await.map(|dom| {
            info!(url = %url, bytes = dom.len(), "Browser render completed");
            RawPayload::markup(StrategyKind::BrowserRender, &url, dom).with_elapsed(started.elapsed())
        });
        outcome.into()
    }

    fn name(&self) -> &str {
        "browser-render"
    }
}
