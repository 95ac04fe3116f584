//! In-flight request coalescing.
//!
//! The first caller for a key becomes the leader and runs the operation on a
//! spawned task; later callers for the same key register a waiter and receive
//! a clone of the leader's result. The key is removed exactly once, by the
//! task that ran the operation, before results are handed out.

use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

use crate::metrics;

/// Failures of the coalescing machinery itself, as opposed to the operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoalesceError {
    #[error("Coalesced operation panicked: {0}")]
    Panicked(String),

    #[error("Coalesced operation was abandoned before completing")]
    Abandoned,
}

type Waiters<T, E> = Vec<oneshot::Sender<Result<T, E>>>;
type PendingMap<T, E> = Arc<Mutex<HashMap<String, Waiters<T, E>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Collapses concurrent identical operations into one.
pub struct Coalescer<T, E> {
    pending: PendingMap<T, E>,
}

impl<T, E> Default for Coalescer<T, E> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T, E> Coalescer<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<CoalesceError> + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently in flight.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.pending).contains_key(key)
    }

    /// Run `op` for `key`, or attach to the identical operation already in
    /// flight. Every caller attached to one run receives the same result.
    ///
    /// `op` is only invoked by the leader.
    pub async fn wrap<F, Fut>(&self, key: &str, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        // Check-and-insert under one lock so two callers can't both lead.
        let waiter = {
            let mut pending = lock(&self.pending);
            match pending.get_mut(key) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    pending.insert(key.to_string(), Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            metrics::COALESCED_REQUESTS.inc();
            debug!(key = %key, "Attached to in-flight request");
            return rx
                .await
                .unwrap_or_else(|_| Err(E::from(CoalesceError::Abandoned)));
        }

        let settle = Settle {
            pending: self.pending.clone(),
            key: key.to_string(),
            done: false,
        };
        let fut = op();
        let handle = tokio::spawn(async move {
            let result = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(E::from(CoalesceError::Panicked(panic_message(&*panic)))),
            };
            settle.finish(&result);
            result
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                debug!(key = %key, error = %e, "Coalesced task did not complete");
                Err(E::from(CoalesceError::Abandoned))
            }
        }
    }
}

/// Removes the pending key once and delivers the result to every waiter.
///
/// If dropped without `finish` (the task was cancelled), the key is still
/// removed and waiters see their channel close.
struct Settle<T, E> {
    pending: PendingMap<T, E>,
    key: String,
    done: bool,
}

impl<T: Clone, E: Clone> Settle<T, E> {
    fn finish(mut self, result: &Result<T, E>) {
        self.done = true;
        let waiters = lock(&self.pending).remove(&self.key).unwrap_or_default();
        if !waiters.is_empty() {
            debug!(key = %self.key, waiters = waiters.len(), "Delivering coalesced result");
        }
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

impl<T, E> Drop for Settle<T, E> {
    fn drop(&mut self) {
        if !self.done {
            lock(&self.pending).remove(&self.key);
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Op(String),
        Coalesce(CoalesceError),
    }

    impl From<CoalesceError> for TestError {
        fn from(e: CoalesceError) -> Self {
            TestError::Coalesce(e)
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_run_once() {
        let coalescer: Coalescer<u32, TestError> = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let futures = (0..10).map(|_| {
            let calls = calls.clone();
            coalescer.wrap("id", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(42)
            })
        });
        let results = join_all(futures).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == Ok(42)));
        assert_eq!(coalescer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_shared_by_every_waiter() {
        let coalescer: Coalescer<u32, TestError> = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let futures = (0..5).map(|_| {
            let calls = calls.clone();
            coalescer.wrap("id", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err(TestError::Op("boom".into()))
            })
        });
        let results = join_all(futures).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results
            .iter()
            .all(|r| *r == Err(TestError::Op("boom".into()))));
        assert_eq!(coalescer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_separately() {
        let coalescer: Coalescer<String, TestError> = Coalescer::new();
        let (a, b) = tokio::join!(
            coalescer.wrap("a", || async { Ok("a".to_string()) }),
            coalescer.wrap("b", || async { Ok("b".to_string()) }),
        );
        assert_eq!(a, Ok("a".to_string()));
        assert_eq!(b, Ok("b".to_string()));
    }

    #[tokio::test]
    async fn test_sequential_calls_rerun() {
        let coalescer: Coalescer<usize, TestError> = Coalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for expected in 1..=3 {
            let calls = calls.clone();
            let value = coalescer
                .wrap("id", move || async move {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
                })
                .await;
            assert_eq!(value, Ok(expected));
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_error_and_clears_key() {
        let coalescer: Coalescer<u32, TestError> = Coalescer::new();
        let result = coalescer
            .wrap("id", || async {
                if true {
                    panic!("exploded");
                }
                Ok(1)
            })
            .await;
        assert_eq!(
            result,
            Err(TestError::Coalesce(CoalesceError::Panicked("exploded".into())))
        );
        assert!(!coalescer.is_pending("id"));
    }
}
