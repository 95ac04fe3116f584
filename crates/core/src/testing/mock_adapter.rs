//! Mock source adapter for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::searcher::{AdapterError, RawResult, SearchQuery, SourceAdapter};

/// Mock implementation of the SourceAdapter trait.
///
/// Clones share state, so a test can keep a handle after registering the
/// adapter:
///
/// ```rust,ignore
/// use yarr_core::testing::{fixtures, MockAdapter};
///
/// let adapter = MockAdapter::new("jackett");
/// adapter.set_results(vec![fixtures::raw_result("jackett", "Movie.1080p", 1)]).await;
/// registry.register(Arc::new(adapter.clone()));
///
/// // ... run a search ...
/// assert_eq!(adapter.call_count().await, 1);
/// ```
#[derive(Clone)]
pub struct MockAdapter {
    name: String,
    /// Results returned by every successful search.
    results: Arc<RwLock<Vec<RawResult>>>,
    /// If set, every search fails with this error.
    error: Arc<RwLock<Option<AdapterError>>>,
    /// Simulated latency before answering.
    delay: Arc<RwLock<Option<Duration>>>,
    /// Never answer.
    hang: Arc<RwLock<bool>>,
    /// Panic inside `search`.
    panic: Arc<RwLock<bool>>,
    /// Queries received, in call order.
    queries: Arc<RwLock<Vec<SearchQuery>>>,
}

impl std::fmt::Debug for MockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAdapter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl MockAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Arc::new(RwLock::new(Vec::new())),
            error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            hang: Arc::new(RwLock::new(false)),
            panic: Arc::new(RwLock::new(false)),
            queries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_results(&self, results: Vec<RawResult>) {
        *self.results.write().await = results;
    }

    pub async fn set_error(&self, error: AdapterError) {
        *self.error.write().await = Some(error);
    }

    pub async fn clear_error(&self) {
        *self.error.write().await = None;
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn set_hang(&self, hang: bool) {
        *self.hang.write().await = hang;
    }

    pub async fn set_panic(&self, panic: bool) {
        *self.panic.write().await = panic;
    }

    /// Number of searches received.
    pub async fn call_count(&self) -> usize {
        self.queries.read().await.len()
    }

    pub async fn recorded_queries(&self) -> Vec<SearchQuery> {
        self.queries.read().await.clone()
    }

    pub async fn last_query(&self) -> Option<SearchQuery> {
        self.queries.read().await.last().cloned()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawResult>, AdapterError> {
        self.queries.write().await.push(query.clone());

        if *self.panic.read().await {
            panic!("mock adapter {} panicked", self.name);
        }
        if *self.hang.read().await {
            std::future::pending::<()>().await;
        }
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.error.read().await.clone() {
            return Err(err);
        }
        Ok(self.results.read().await.clone())
    }
}
