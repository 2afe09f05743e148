//! Integration tests for the blocking and pooled entry points.

use std::sync::Arc;
use std::time::Duration;

use relatoria::{
    testing::{
        failing_search, scripted_search, slow_search, CallLog, ScriptedStrategy, LISTING_MARKUP,
    },
    SearchError, SearchParams, SearchPool, StrategyKind,
};

fn params() -> SearchParams {
    SearchParams::new("1992-01-01", "2025-08-17", "agente oficioso")
}

#[test]
fn test_blocking_and_pooled_results_are_identical() {
    let blocking = failing_search(&CallLog::new())
        .search_blocking(&params())
        .unwrap()
        .to_json()
        .unwrap();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let pool = SearchPool::new(
        Arc::new(failing_search(&CallLog::new())),
        2,
        runtime.handle().clone(),
    );
    let pooled = runtime
        .block_on(pool.search(params()))
        .unwrap()
        .to_json()
        .unwrap();

    assert_eq!(blocking, pooled);
}

#[test]
fn test_blocking_and_pooled_agree_on_markup() {
    let build = |log: &CallLog| {
        scripted_search(
            ScriptedStrategy::unreachable(StrategyKind::BrowserRender),
            ScriptedStrategy::markup(StrategyKind::StaticFetch, LISTING_MARKUP),
            ScriptedStrategy::unreachable(StrategyKind::HiddenApi),
            log,
        )
    };
    let params = SearchParams::new("2020-01-01", "2025-12-31", "tutela");

    let blocking = build(&CallLog::new()).search_blocking(&params).unwrap();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let pool = SearchPool::new(Arc::new(build(&CallLog::new())), 1, runtime.handle().clone());
    let pooled = runtime.block_on(pool.search(params)).unwrap();

    assert_eq!(blocking, pooled);
}

#[tokio::test]
async fn test_try_submit_reports_exhaustion() {
    let log = CallLog::new();
    let pool = SearchPool::on_current_runtime(
        Arc::new(slow_search(&log, Duration::from_secs(10))),
        1,
    )
    .unwrap();

    let running = pool.try_submit(params()).unwrap();
    assert_eq!(pool.available_workers(), 0);

    let err = pool.try_submit(params()).unwrap_err();
    assert!(matches!(err, SearchError::PoolExhausted));

    running.abort();
    assert!(matches!(running.await, Err(SearchError::WorkerFailed(_))));
}

#[tokio::test]
async fn test_submit_waits_for_a_free_worker() {
    let log = CallLog::new();
    let delay = Duration::from_millis(150);
    let pool = SearchPool::on_current_runtime(Arc::new(slow_search(&log, delay)), 1).unwrap();

    let first = pool.submit(params()).unwrap();
    let second = pool.submit(params()).unwrap();

    let (first, second) = tokio::join!(first, second);
    assert_eq!(first.unwrap(), second.unwrap());

    let calls = log.records();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].at.duration_since(calls[0].at) >= delay);
    assert_eq!(pool.available_workers(), 1);
}

#[tokio::test]
async fn test_pooled_search_validates_before_spawning() {
    let log = CallLog::new();
    let pool = SearchPool::on_current_runtime(Arc::new(failing_search(&log)), 4).unwrap();

    let err = pool
        .try_submit(SearchParams::new("2025-03-01", "2025-02-01", "tutela"))
        .unwrap_err();
    assert!(matches!(err, SearchError::InvalidQuery { .. }));
    assert!(log.is_empty());
    assert_eq!(pool.workers(), 4);
}
