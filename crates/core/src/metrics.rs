//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Fan-out search (per-adapter outcomes, latency, deadline hits)
//! - Filtering (aggregate rejections per predicate)
//! - Cache acceleration (debrid checks per service and method)
//! - Result cache and request coalescing

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Opts};

// =============================================================================
// Search Metrics
// =============================================================================

/// Adapter requests total by outcome.
pub static ADAPTER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("yarr_adapter_requests_total", "Total source adapter requests"),
        &["adapter", "status"], // status: "success", "error", "timeout"
    )
    .unwrap()
});

/// Adapter call duration in seconds (settled calls only).
pub static ADAPTER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "yarr_adapter_duration_seconds",
            "Duration of source adapter searches",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 45.0]),
        &["adapter"],
    )
    .unwrap()
});

/// Raw results per fan-out search.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "yarr_search_results",
            "Number of raw results returned per fan-out search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
        &[],
    )
    .unwrap()
});

/// Searches where the global deadline fired before every adapter settled.
pub static SEARCH_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "yarr_search_timeouts_total",
        "Fan-out searches that returned partial results at the deadline",
    )
    .unwrap()
});

/// Current adapter health (1 for the adapter's current status).
pub static PROVIDER_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("yarr_provider_status", "Adapter health status"),
        &["adapter", "status"],
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Filter rejections by predicate.
pub static FILTER_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "yarr_filter_rejections_total",
            "Results dropped by the filter pipeline",
        ),
        &["predicate"],
    )
    .unwrap()
});

/// Debrid availability checks by service, method and outcome.
pub static DEBRID_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("yarr_debrid_checks_total", "Debrid cache availability checks"),
        &["service", "method", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Result cache lookups.
pub static RESULT_CACHE: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("yarr_result_cache_total", "Result cache lookups"),
        &["outcome"], // "hit", "miss"
    )
    .unwrap()
});

/// Callers that attached to an already in-flight resolution.
pub static COALESCED_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "yarr_coalesced_requests_total",
        "Requests served by an in-flight identical request",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(ADAPTER_REQUESTS.clone()),
        Box::new(ADAPTER_DURATION.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        Box::new(SEARCH_TIMEOUTS.clone()),
        Box::new(PROVIDER_STATUS.clone()),
        // Pipeline
        Box::new(FILTER_REJECTIONS.clone()),
        Box::new(DEBRID_CHECKS.clone()),
        Box::new(RESULT_CACHE.clone()),
        Box::new(COALESCED_REQUESTS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register_cleanly() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        RESULT_CACHE.with_label_values(&["hit"]).inc();
        let names: Vec<_> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"yarr_result_cache_total".to_string()));
    }
}
