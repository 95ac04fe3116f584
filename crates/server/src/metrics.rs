//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the yarr server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Resolver state (result cache size, in-flight resolutions, collected dynamically)
//! - Adapter health (collected dynamically into the core status gauge)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;
use yarr_core::metrics::PROVIDER_STATUS;
use yarr_core::searcher::HealthStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "yarr_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("yarr_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "yarr_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Resolver Metrics (collected dynamically)
// =============================================================================

/// Entries held by the result cache, expired ones included until swept.
pub static RESULT_CACHE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "yarr_result_cache_entries",
        "Number of entries in the result cache",
    )
    .unwrap()
});

/// Distinct resolutions currently executing.
pub static RESOLUTIONS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "yarr_resolutions_in_flight",
        "Number of distinct stream resolutions currently executing",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Resolver
    registry
        .register(Box::new(RESULT_CACHE_ENTRIES.clone()))
        .unwrap();
    registry
        .register(Box::new(RESOLUTIONS_IN_FLIGHT.clone()))
        .unwrap();

    // Core metrics (search fan-out, filtering, acceleration, caching)
    for metric in yarr_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the resolver at scrape time.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let resolver = state.resolver();

    RESULT_CACHE_ENTRIES.set(resolver.cache().len().await as i64);
    RESOLUTIONS_IN_FLIGHT.set(resolver.in_flight() as i64);

    for record in resolver.health().all().await {
        for status in [HealthStatus::Healthy, HealthStatus::Degraded, HealthStatus::Down] {
            let value = i64::from(record.status == status);
            PROVIDER_STATUS
                .with_label_values(&[record.name.as_str(), status.as_str()])
                .set(value);
        }
    }
}

static HASH_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{40}").unwrap());
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());
static PROVIDER_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/api/v1/providers/)[^/]+(/reset)$").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = PROVIDER_SEGMENT.replace(path, "${1}{name}${2}");
    let result = HASH_SEGMENT.replace_all(&result, "{hash}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_hash() {
        let path = "/api/v1/streams/a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
        assert_eq!(normalize_path(path), "/api/v1/streams/{hash}");
    }

    #[test]
    fn test_normalize_path_provider_name() {
        let path = "/api/v1/providers/my-jackett/reset";
        assert_eq!(normalize_path(path), "/api/v1/providers/{name}/reset");
    }

    #[test]
    fn test_normalize_path_numeric() {
        let path = "/api/v1/items/12345";
        assert_eq!(normalize_path(path), "/api/v1/items/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics().unwrap();
        assert!(output.contains("yarr_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_server_and_core_metrics() {
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        RESULT_CACHE_ENTRIES.set(0);
        RESOLUTIONS_IN_FLIGHT.set(0);
        yarr_core::metrics::RESULT_CACHE
            .with_label_values(&["miss"])
            .inc();

        let output = encode_metrics().unwrap();

        assert!(output.contains("yarr_http_request_duration_seconds"));
        assert!(output.contains("yarr_http_requests_in_flight"));
        assert!(output.contains("yarr_result_cache_entries"));
        assert!(output.contains("yarr_resolutions_in_flight"));
        assert!(output.contains("yarr_result_cache_total"));
    }
}
