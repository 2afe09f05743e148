//! Bounded, non-blocking search execution.
//!
//! [`SearchPool`] runs the same pipeline as [`RulingSearch::search_blocking`]
//! on a Tokio runtime, with at most `workers` searches in flight. Callers get
//! a [`SearchHandle`] future back immediately.
//!
//! Backpressure is observable: [`SearchPool::submit`] waits for a free
//! worker inside the spawned task, while [`SearchPool::try_submit`] fails
//! with [`SearchError::PoolExhausted`] when every worker is busy.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{SearchError, SearchResult};
use crate::search::RulingSearch;
use crate::traits::strategy::{FallbackStrategy, RetrievalStrategy};
use crate::types::query::{SearchParams, SearchQuery};
use crate::types::ruling::ExtractionResult;

/// A pending pooled search.
///
/// Resolves to the same result the blocking entry point would return.
#[derive(Debug)]
pub struct SearchHandle {
    inner: JoinHandle<SearchResult<ExtractionResult>>,
}

impl SearchHandle {
    /// Cancel the search. Awaiting the handle afterwards yields `WorkerFailed`.
    pub fn abort(&self) {
        self.inner.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Future for SearchHandle {
    type Output = SearchResult<ExtractionResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(e)) => Poll::Ready(Err(SearchError::WorkerFailed(e.to_string()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Runs searches on a bounded set of workers.
pub struct SearchPool<B, S, H, F> {
    search: Arc<RulingSearch<B, S, H, F>>,
    permits: Arc<Semaphore>,
    workers: usize,
    runtime: Handle,
}

impl<B, S, H, F> SearchPool<B, S, H, F>
where
    B: RetrievalStrategy + 'static,
    S: RetrievalStrategy + 'static,
    H: RetrievalStrategy + 'static,
    F: FallbackStrategy + 'static,
{
    /// Create a pool spawning onto `runtime`.
    pub fn new(search: Arc<RulingSearch<B, S, H, F>>, workers: usize, runtime: Handle) -> Self {
        let workers = workers.max(1);
        Self {
            search,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            runtime,
        }
    }

    /// Create a pool on the runtime the caller is running in.
    pub fn on_current_runtime(
        search: Arc<RulingSearch<B, S, H, F>>,
        workers: usize,
    ) -> SearchResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| SearchError::Runtime(std::io::Error::other(e.to_string())))?;
        Ok(Self::new(search, workers, runtime))
    }

    /// Submit a search, waiting for a free worker inside the task.
    ///
    /// Parameters are validated before anything is spawned.
    pub fn submit(&self, params: SearchParams) -> SearchResult<SearchHandle> {
        let query = SearchQuery::try_from(params)?;
        let search = Arc::clone(&self.search);
        let permits = Arc::clone(&self.permits);

        let inner = self.runtime.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| SearchError::WorkerFailed("search pool closed".into()))?;
            Ok(search.run_query(&query).await)
        });
        Ok(SearchHandle { inner })
    }

    /// Submit a search only if a worker is free right now.
    pub fn try_submit(&self, params: SearchParams) -> SearchResult<SearchHandle> {
        let query = SearchQuery::try_from(params)?;
        let permit = Arc::clone(&self.permits).try_acquire_owned().map_err(|_| {
            debug!(workers = self.workers, "Search pool exhausted");
            SearchError::PoolExhausted
        })?;
        Ok(self.spawn_with_permit(query, permit))
    }

    fn spawn_with_permit(&self, query: SearchQuery, permit: OwnedSemaphorePermit) -> SearchHandle {
        let search = Arc::clone(&self.search);
        let inner = self.runtime.spawn(async move {
            let _permit = permit;
            Ok(search.run_query(&query).await)
        });
        SearchHandle { inner }
    }

    /// Submit and wait.
    pub async fn search(&self, params: SearchParams) -> SearchResult<ExtractionResult> {
        self.submit(params)?.await
    }

    /// Workers not currently running a search.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn inner(&self) -> &Arc<RulingSearch<B, S, H, F>> {
        &self.search
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{failing_search, CallLog};
    use std::time::Duration;

    #[tokio::test]
    async fn test_pool_rejects_invalid_query_without_spawning() {
        let log = CallLog::new();
        let pool = SearchPool::on_current_runtime(Arc::new(failing_search(&log)), 2).unwrap();

        let err = pool
            .submit(SearchParams::new("2025-01-01", "2025-01-01", "x").with_page(-3))
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery { .. }));
        assert!(log.is_empty());
        assert_eq!(pool.available_workers(), 2);
    }

    #[tokio::test]
    async fn test_pool_search_returns_result() {
        let log = CallLog::new();
        let pool = SearchPool::on_current_runtime(Arc::new(failing_search(&log)), 1).unwrap();

        let result = pool
            .search(SearchParams::new("2025-01-01", "2025-06-30", "educación"))
            .await
            .unwrap();
        assert!(!result.is_empty());
        assert_eq!(pool.available_workers(), 1);
    }

    #[tokio::test]
    async fn test_aborted_search_reports_worker_failure() {
        let log = CallLog::new();
        let search = crate::testing::slow_search(&log, Duration::from_secs(10));
        let pool = SearchPool::on_current_runtime(Arc::new(search), 1).unwrap();

        let handle = pool
            .submit(SearchParams::new("2025-01-01", "2025-06-30", "tutela"))
            .unwrap();
        handle.abort();
        assert!(matches!(handle.await, Err(SearchError::WorkerFailed(_))));
    }
}
