//! Ruling Search - Command Line Example
//!
//! Runs one search against the live archive and prints the grouped result
//! as JSON.
//!
//! ```bash
//! cargo run --example search -- 1992-01-01 2025-08-17 "agente oficioso"
//! ```
//!
//! Configuration comes from `RELATORIA_*` environment variables (or a `.env`
//! file). Set `RELATORIA_BROWSER_ENABLED=false` to skip the headless browser,
//! and `RUST_LOG=relatoria=debug` to watch the strategy chain.
//!
//! Pass `--pool` to run the search through a [`SearchPool`] instead of the
//! blocking entry point.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use relatoria::{LiveRulingSearch, ScraperConfig, SearchParams, SearchPool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,relatoria=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let pooled = match args.iter().position(|a| a == "--pool") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };
    let [start, end, keyword, rest @ ..] = args.as_slice() else {
        bail!("usage: search <start-date> <end-date> <keyword> [extra-filter] [page] [--pool]");
    };

    let mut params = SearchParams::new(start.as_str(), end.as_str(), keyword.as_str());
    if let Some(extra) = rest.first() {
        params = params.with_extra_filter(extra.as_str());
    }
    if let Some(page) = rest.get(1) {
        params = params.with_page(page.parse().context("page must be an integer")?);
    }

    let config = ScraperConfig::from_env().context("Failed to load configuration")?;
    let search =
        LiveRulingSearch::from_config(&config).context("Failed to build search pipeline")?;

    let result = if pooled {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start runtime")?;
        let pool = SearchPool::new(Arc::new(search), config.workers, runtime.handle().clone());
        runtime.block_on(pool.search(params))?
    } else {
        search.search_blocking(&params)?
    };

    println!("{}", result.to_json()?);
    Ok(())
}
