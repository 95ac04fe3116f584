//! Fan-out search across every enabled adapter under one global deadline.

use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::metrics;

use super::health::ProviderHealthMonitor;
use super::registry::AdapterRegistry;
use super::{AdapterError, RawResult, SearchQuery};

/// How one adapter's call ended.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdapterOutcome {
    Success { results: usize },
    Failed { error: String },
    TimedOut,
}

/// Per-adapter report entry.
#[derive(Debug, Clone, Serialize)]
pub struct AdapterReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: AdapterOutcome,
    /// `None` for adapters abandoned at the deadline.
    pub elapsed_ms: Option<u64>,
}

/// Result of one fan-out.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchReport {
    /// Union of completed adapters' results, in registration order.
    pub results: Vec<RawResult>,
    pub adapters: Vec<AdapterReport>,
    /// Adapters skipped because they are down.
    pub skipped: Vec<String>,
    /// True when no adapter was enabled for this request.
    pub no_sources: bool,
    pub elapsed_ms: u64,
}

impl SearchReport {
    fn no_sources() -> Self {
        Self {
            no_sources: true,
            ..Self::default()
        }
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, AdapterOutcome::Success { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, AdapterOutcome::Failed { .. }))
    }

    pub fn timed_out(&self) -> usize {
        self.count(|o| matches!(o, AdapterOutcome::TimedOut))
    }

    fn count(&self, pred: impl Fn(&AdapterOutcome) -> bool) -> usize {
        self.adapters.iter().filter(|a| pred(&a.outcome)).count()
    }
}

type TaskOutput = (usize, Result<Vec<RawResult>, AdapterError>, Duration);

/// Launches one task per adapter and collects whatever settles before the deadline.
///
/// Adapter failures never propagate: each is converted into a health signal and
/// an empty contribution. There are no retries.
pub struct SearchOrchestrator {
    registry: Arc<AdapterRegistry>,
    health: Arc<ProviderHealthMonitor>,
}

impl SearchOrchestrator {
    pub fn new(registry: Arc<AdapterRegistry>, health: Arc<ProviderHealthMonitor>) -> Self {
        Self { registry, health }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    pub fn health(&self) -> &Arc<ProviderHealthMonitor> {
        &self.health
    }

    /// Search every enabled adapter (or the requested subset) with a global timeout.
    pub async fn search(
        &self,
        query: &SearchQuery,
        requested: Option<&[String]>,
        timeout: Duration,
    ) -> SearchReport {
        let started = Instant::now();
        let deadline = started + timeout;

        let candidates = self.registry.enabled(requested);
        if candidates.is_empty() {
            warn!(query = %query.query, "No source adapters enabled");
            return SearchReport::no_sources();
        }

        // Health is advisory: skip down adapters unless nothing else is left.
        let mut selected = Vec::with_capacity(candidates.len());
        let mut skipped = Vec::new();
        for (name, adapter) in &candidates {
            if self.health.should_use(name).await {
                selected.push((name.clone(), Arc::clone(adapter)));
            } else {
                skipped.push(name.clone());
            }
        }
        if selected.is_empty() {
            warn!(
                adapters = candidates.len(),
                "All enabled adapters are down, querying them anyway"
            );
            selected = candidates;
            skipped.clear();
        }

        debug!(
            query = %query.query,
            adapters = selected.len(),
            skipped = skipped.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Starting fan-out search"
        );

        let query = Arc::new(query.clone());
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        for (slot, (_, adapter)) in selected.iter().enumerate() {
            let adapter = Arc::clone(adapter);
            let query = Arc::clone(&query);
            tasks.spawn(async move {
                let call_started = Instant::now();
                let result = AssertUnwindSafe(adapter.search(&query))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(AdapterError::Aborted("adapter panicked".into())));
                (slot, result, call_started.elapsed())
            });
        }

        let mut settled: Vec<Option<(Result<Vec<RawResult>, AdapterError>, Duration)>> =
            (0..selected.len()).map(|_| None).collect();
        let mut deadline_hit = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((slot, result, elapsed)))) => {
                    let name = &selected[slot].0;
                    self.record(name, &result, elapsed).await;
                    settled[slot] = Some((result, elapsed));
                }
                Ok(Some(Err(join_error))) => {
                    // Only reachable if the runtime cancelled a task; its slot
                    // stays unsettled and is reported as timed out below.
                    warn!(error = %join_error, "Adapter task did not complete");
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    break;
                }
            }
        }

        // Abandon anything still running.
        tasks.abort_all();

        let mut report = SearchReport {
            skipped,
            ..SearchReport::default()
        };

        for (slot, (name, _)) in selected.iter().enumerate() {
            match settled[slot].take() {
                Some((Ok(mut results), elapsed)) => {
                    report.adapters.push(AdapterReport {
                        name: name.clone(),
                        outcome: AdapterOutcome::Success {
                            results: results.len(),
                        },
                        elapsed_ms: Some(elapsed.as_millis() as u64),
                    });
                    report.results.append(&mut results);
                }
                Some((Err(e), elapsed)) => report.adapters.push(AdapterReport {
                    name: name.clone(),
                    outcome: AdapterOutcome::Failed {
                        error: e.to_string(),
                    },
                    elapsed_ms: Some(elapsed.as_millis() as u64),
                }),
                None => {
                    warn!(adapter = %name, "Adapter missed the search deadline");
                    self.health.record_failure(name).await;
                    metrics::ADAPTER_REQUESTS
                        .with_label_values(&[name.as_str(), "timeout"])
                        .inc();
                    report.adapters.push(AdapterReport {
                        name: name.clone(),
                        outcome: AdapterOutcome::TimedOut,
                        elapsed_ms: None,
                    });
                }
            }
        }

        if deadline_hit {
            metrics::SEARCH_TIMEOUTS.inc();
        }
        metrics::SEARCH_RESULTS
            .with_label_values(&[])
            .observe(report.results.len() as f64);

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            query = %query.query,
            results = report.results.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            timed_out = report.timed_out(),
            elapsed_ms = report.elapsed_ms,
            "Fan-out search complete"
        );

        report
    }

    async fn record(
        &self,
        name: &str,
        result: &Result<Vec<RawResult>, AdapterError>,
        elapsed: Duration,
    ) {
        metrics::ADAPTER_DURATION
            .with_label_values(&[name])
            .observe(elapsed.as_secs_f64());

        match result {
            Ok(results) => {
                debug!(
                    adapter = %name,
                    results = results.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Adapter search complete"
                );
                self.health.record_success(name, elapsed).await;
                metrics::ADAPTER_REQUESTS
                    .with_label_values(&[name, "success"])
                    .inc();
            }
            Err(e) => {
                warn!(adapter = %name, error = %e, "Adapter search failed");
                self.health.record_failure(name).await;
                metrics::ADAPTER_REQUESTS
                    .with_label_values(&[name, "error"])
                    .inc();
            }
        }
    }
}
