//! Short-TTL result cache.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::metrics;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Stored entries, including expired ones not yet swept.
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub default_ttl_secs: u64,
}

impl CacheStats {
    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Key/value cache with per-entry TTL.
///
/// `get` checks expiry itself, so correctness never depends on the sweeper;
/// the sweeper only reclaims memory.
pub struct ResultCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> ResultCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Value for `key`, or `None` once its TTL has elapsed. An expired read
    /// evicts the entry.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::RESULT_CACHE.with_label_values(&["hit"]).inc();
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.record_miss();
                    return None;
                }
            }
        }

        // Expired: recheck under the write lock, a fresh value may have landed.
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::RESULT_CACHE.with_label_values(&["hit"]).inc();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                debug!(key = %key, "Evicted expired cache entry on read");
                self.record_miss();
                None
            }
            None => {
                self.record_miss();
                None
            }
        }
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::RESULT_CACHE.with_label_values(&["miss"]).inc();
    }

    /// Store with the default TTL.
    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl).await;
    }

    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
            ttl,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    pub async fn remove(&self, key: &str) -> Option<V> {
        self.entries.write().await.remove(key).map(|e| e.value)
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            default_ttl_secs: self.default_ttl.as_secs(),
        }
    }

    /// Sweep on an interval until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let removed = cache.sweep().await;
                if removed > 0 {
                    debug!(removed = removed, "Swept expired cache entries");
                }
            }
        })
    }
}
