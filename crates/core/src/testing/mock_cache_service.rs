//! Mock acceleration service for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::debrid::{AvailabilityMap, CacheService, DebridError};

/// Mock implementation of the CacheService trait.
///
/// Reports the configured hashes as instantly available and every other
/// requested hash as unavailable. Clones share state.
#[derive(Clone)]
pub struct MockCacheService {
    name: String,
    cached: Arc<RwLock<HashSet<String>>>,
    links: Arc<RwLock<HashMap<String, String>>>,
    error: Arc<RwLock<Option<DebridError>>>,
    checks: Arc<RwLock<Vec<Vec<String>>>>,
}

impl std::fmt::Debug for MockCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCacheService")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl MockCacheService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cached: Arc::new(RwLock::new(HashSet::new())),
            links: Arc::new(RwLock::new(HashMap::new())),
            error: Arc::new(RwLock::new(None)),
            checks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_cached(&self, hashes: &[String]) {
        *self.cached.write().await = hashes.iter().map(|h| h.to_lowercase()).collect();
    }

    /// Direct link returned for a magnet.
    pub async fn set_link(&self, magnet: &str, url: &str) {
        self.links
            .write()
            .await
            .insert(magnet.to_string(), url.to_string());
    }

    /// Every call fails with this error until cleared.
    pub async fn set_error(&self, error: DebridError) {
        *self.error.write().await = Some(error);
    }

    pub async fn clear_error(&self) {
        *self.error.write().await = None;
    }

    /// Hash batches received by `check_cached_batch`.
    pub async fn recorded_checks(&self) -> Vec<Vec<String>> {
        self.checks.read().await.clone()
    }
}

#[async_trait]
impl CacheService for MockCacheService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_cached_batch(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        self.checks.write().await.push(hashes.to_vec());
        if let Some(err) = self.error.read().await.clone() {
            return Err(err);
        }
        let cached = self.cached.read().await;
        Ok(hashes
            .iter()
            .map(|h| (h.clone(), cached.contains(&h.to_lowercase())))
            .collect())
    }

    async fn get_accelerated_link(&self, magnet: &str) -> Result<Option<String>, DebridError> {
        if let Some(err) = self.error.read().await.clone() {
            return Err(err);
        }
        Ok(self.links.read().await.get(magnet).cloned())
    }
}
