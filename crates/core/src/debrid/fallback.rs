//! Ordered fallback chain shared by every acceleration-service integration.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics;

use super::types::{AvailabilityMap, CheckStrategy, DebridError};

/// Strategies tried in order until one succeeds.
///
/// A failing step (rejected, transient, or unparseable) moves on to the next
/// one. A successful step's map is completed with `false` for any hash it
/// did not mention, so callers never see an undetermined hash.
pub struct FallbackChain {
    service: String,
    steps: Vec<Box<dyn CheckStrategy>>,
}

impl FallbackChain {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            steps: Vec::new(),
        }
    }

    /// Append a strategy to the end of the chain.
    pub fn then(mut self, step: impl CheckStrategy + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn run(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        if hashes.is_empty() {
            return Ok(AvailabilityMap::new());
        }

        let mut attempts = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            match step.check(hashes).await {
                Ok(found) => {
                    metrics::DEBRID_CHECKS
                        .with_label_values(&[self.service.as_str(), step.name(), "success"])
                        .inc();
                    let map = complete(found, hashes);
                    debug!(
                        service = %self.service,
                        method = step.name(),
                        cached = map.values().filter(|v| **v).count(),
                        total = hashes.len(),
                        "Availability check succeeded"
                    );
                    return Ok(map);
                }
                Err(e) => {
                    metrics::DEBRID_CHECKS
                        .with_label_values(&[self.service.as_str(), step.name(), "error"])
                        .inc();
                    warn!(
                        service = %self.service,
                        method = step.name(),
                        rejected = e.is_rejection(),
                        error = %e,
                        "Availability check failed, trying next method"
                    );
                    attempts.push(format!("{}: {}", step.name(), e));
                }
            }
        }

        Err(DebridError::Exhausted {
            service: self.service.clone(),
            attempts,
        })
    }
}

/// Restrict to the requested hashes and default the rest to `false`.
pub fn complete(found: AvailabilityMap, hashes: &[String]) -> AvailabilityMap {
    hashes
        .iter()
        .map(|h| (h.clone(), found.get(h).copied().unwrap_or(false)))
        .collect()
}

/// Last-resort step: run an inner strategy over small sub-batches with a fixed
/// delay between them. A failed sub-batch marks its hashes unavailable.
pub struct SequentialBatches<S> {
    inner: S,
    batch_size: usize,
    delay: Duration,
}

impl<S: CheckStrategy> SequentialBatches<S> {
    pub fn new(inner: S, batch_size: usize, delay: Duration) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
            delay,
        }
    }
}

#[async_trait]
impl<S: CheckStrategy> CheckStrategy for SequentialBatches<S> {
    fn name(&self) -> &str {
        "sequential"
    }

    async fn check(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        let mut results = AvailabilityMap::with_capacity(hashes.len());
        let batches: Vec<&[String]> = hashes.chunks(self.batch_size).collect();
        let mut failed = 0usize;

        for (i, batch) in batches.iter().enumerate() {
            match self.inner.check(batch).await {
                Ok(found) => results.extend(complete(found, batch)),
                Err(e) => {
                    debug!(batch = i, error = %e, "Sub-batch failed, marking unavailable");
                    failed += 1;
                    results.extend(batch.iter().map(|h| (h.clone(), false)));
                }
            }
            if i + 1 < batches.len() {
                tokio::time::sleep(self.delay).await;
            }
        }

        if failed > 0 {
            debug!(failed = failed, batches = batches.len(), "Sequential check finished");
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Strategy that always fails with a fixed error.
    struct Failing(DebridError, Arc<AtomicUsize>);

    #[async_trait]
    impl CheckStrategy for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn check(&self, _hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Err(self.0.clone())
        }
    }

    /// Strategy that rejects batches larger than `max` and reports `cached` hashes.
    struct Limited {
        max: usize,
        cached: HashSet<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CheckStrategy for Limited {
        fn name(&self) -> &str {
            "limited"
        }

        async fn check(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if hashes.len() > self.max {
                return Err(DebridError::Http {
                    status: 403,
                    code: Some(37),
                    message: "disabled_endpoint".into(),
                });
            }
            Ok(hashes
                .iter()
                .filter(|h| self.cached.contains(*h))
                .map(|h| (h.clone(), true))
                .collect())
        }
    }

    fn hashes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:040x}", i)).collect()
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new("svc")
            .then(Limited {
                max: 100,
                cached: hashes(1).into_iter().collect(),
                calls: calls.clone(),
            })
            .then(Failing(DebridError::Timeout, calls.clone()));

        let map = chain.run(&hashes(3)).await.unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.values().filter(|v| **v).count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_403_falls_back_to_sequential_batches() {
        let direct_calls = Arc::new(AtomicUsize::new(0));
        let proxy_calls = Arc::new(AtomicUsize::new(0));
        let sequential_calls = Arc::new(AtomicUsize::new(0));
        let all = hashes(25);
        let cached: HashSet<String> = all.iter().step_by(5).cloned().collect();

        let chain = FallbackChain::new("svc")
            .then(Limited {
                max: 10,
                cached: cached.clone(),
                calls: direct_calls.clone(),
            })
            .then(Failing(
                DebridError::ConnectionFailed("proxy down".into()),
                proxy_calls.clone(),
            ))
            .then(SequentialBatches::new(
                Limited {
                    max: 10,
                    cached: cached.clone(),
                    calls: sequential_calls.clone(),
                },
                10,
                Duration::from_millis(200),
            ));

        let started = tokio::time::Instant::now();
        let map = chain.run(&all).await.unwrap();

        assert_eq!(map.len(), 25);
        assert!(all.iter().all(|h| map.contains_key(h)));
        assert_eq!(map.values().filter(|v| **v).count(), cached.len());
        assert_eq!(direct_calls.load(Ordering::SeqCst), 1);
        assert_eq!(proxy_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sequential_calls.load(Ordering::SeqCst), 3);
        // Two inter-batch delays for three batches
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sub_batch_marks_false() {
        let calls = Arc::new(AtomicUsize::new(0));
        let step = SequentialBatches::new(
            Limited {
                max: 1,
                cached: hashes(4).into_iter().collect(),
                calls: calls.clone(),
            },
            2,
            Duration::from_millis(10),
        );
        let map = step.check(&hashes(4)).await.unwrap();
        assert_eq!(map.len(), 4);
        assert!(map.values().all(|v| !*v));
    }

    #[tokio::test]
    async fn test_all_steps_fail_is_exhausted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new("svc")
            .then(Failing(DebridError::Timeout, calls.clone()))
            .then(Failing(DebridError::Parse("bad".into()), calls.clone()));

        let err = chain.run(&hashes(2)).await.unwrap_err();
        match err {
            DebridError::Exhausted { service, attempts } => {
                assert_eq!(service, "svc");
                assert_eq!(attempts.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_input_skips_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new("svc").then(Failing(DebridError::Timeout, calls.clone()));
        assert!(chain.run(&[]).await.unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_complete_drops_unrequested_and_fills_missing() {
        let mut found = AvailabilityMap::new();
        found.insert("a".into(), true);
        found.insert("zzz".into(), true);
        let map = complete(found, &["a".to_string(), "b".to_string()]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], true);
        assert_eq!(map["b"], false);
    }
}
