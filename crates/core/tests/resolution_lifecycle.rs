//! Stream resolution integration tests.
//!
//! These tests drive `StreamResolver` end to end with mock adapters and mock
//! acceleration services:
//! - Fan-out under a global deadline with a hanging adapter
//! - Cross-strategy deduplication with tracker provenance
//! - Filter rejections and health transitions
//! - Coalescing and result-cache expiry

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use yarr_core::{
    pipeline::{CacheFilter, ResolverSettings},
    ranking::ScoreTable,
    searcher::HealthStatus,
    testing::{fixtures, MockAdapter, MockCacheService},
    AdapterError, AdapterRegistry, CacheResolver, HealthConfig, PipelineError, Preferences,
    ProviderHealthMonitor, Ranker, SearchOrchestrator, StreamRequest, StreamResolver,
};

/// Test helper wiring a resolver to mocks.
struct TestHarness {
    resolver: Arc<StreamResolver>,
    adapters: Vec<MockAdapter>,
    debrid: MockCacheService,
}

impl TestHarness {
    fn new(adapter_names: &[&str]) -> Self {
        Self::with_settings(adapter_names, ResolverSettings::default())
    }

    fn with_settings(adapter_names: &[&str], settings: ResolverSettings) -> Self {
        let adapters: Vec<MockAdapter> = adapter_names.iter().map(|n| MockAdapter::new(*n)).collect();
        let mut registry = AdapterRegistry::new();
        for adapter in &adapters {
            registry.register(Arc::new(adapter.clone()));
        }
        let health = Arc::new(ProviderHealthMonitor::new(HealthConfig::default()));
        let debrid = MockCacheService::new("RealDebrid");
        let resolver = StreamResolver::new(
            SearchOrchestrator::new(Arc::new(registry), health),
            Ranker::new(ScoreTable::default()),
            CacheResolver::new(vec![Arc::new(debrid.clone())]),
            settings,
        );
        Self {
            resolver: Arc::new(resolver),
            adapters,
            debrid,
        }
    }

    fn adapter(&self, index: usize) -> &MockAdapter {
        &self.adapters[index]
    }
}

fn settings(timeout: Duration) -> ResolverSettings {
    ResolverSettings {
        search_timeout: timeout,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_adapter_does_not_hold_the_deadline() {
    let harness = TestHarness::with_settings(
        &["a1", "a2", "a3", "a4", "slow"],
        settings(Duration::from_millis(2000)),
    );
    for i in 0..4 {
        let name = format!("Movie.2020.1080p.WEB-DL.x264-G{}", i);
        let tracker = format!("a{}", i + 1);
        harness
            .adapter(i)
            .set_results(vec![fixtures::raw_result(&tracker, &name, i as u64 + 1)])
            .await;
    }
    harness.adapter(4).set_hang(true).await;

    let started = Instant::now();
    let resolution = harness
        .resolver
        .resolve(&StreamRequest::movie("tt0001", "Movie 2020"))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(2000));
    assert!(elapsed < Duration::from_millis(2200));
    assert_eq!(resolution.streams.len(), 4);
    assert_eq!(resolution.stats.adapters_succeeded, 4);
    assert_eq!(resolution.stats.adapters_timed_out, 1);

    let health = harness.resolver.health();
    assert_eq!(health.status("slow").await, HealthStatus::Degraded);
    assert_eq!(health.status("a1").await, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_duplicates_collapse_across_strategies() {
    let harness = TestHarness::new(&["one", "two", "three"]);

    let first = fixtures::raw_result("one", "Movie.2020.1080p.BluRay.x264-AAA", 1);
    // Same hash, different name and tracker
    let second = fixtures::raw_result("two", "Movie 2020 1080p BluRay x264 BBB", 1);
    // Different hash, same rounded size and quality tokens
    let mut third = fixtures::raw_result("three", "Movie.2020.1080p.BluRay.x264-CCC", 7);
    third.size_bytes = first.size_bytes.map(|s| s + 10_000_000);

    harness.adapter(0).set_results(vec![first]).await;
    harness.adapter(1).set_results(vec![second]).await;
    harness.adapter(2).set_results(vec![third]).await;

    let resolution = harness
        .resolver
        .resolve(&StreamRequest::movie("tt0002", "Movie 2020"))
        .await
        .unwrap();

    assert_eq!(resolution.stats.raw_results, 3);
    assert_eq!(resolution.streams.len(), 1);
    let stream = &resolution.streams[0];
    assert_eq!(stream.info_hash.as_deref(), Some(fixtures::info_hash(1).as_str()));
    assert_eq!(stream.trackers, vec!["one", "two", "three"]);
    assert!(stream.description.contains("one, two, three"));
}

#[tokio::test]
async fn test_filters_reject_low_seeders_cam_and_4k() {
    let harness = TestHarness::new(&["idx"]);
    let mut few_seeders = fixtures::raw_result("idx", "Movie.2021.1080p.WEB-DL.x264-LOW", 1);
    few_seeders.seeders = Some(2);
    harness
        .adapter(0)
        .set_results(vec![
            few_seeders,
            fixtures::raw_result("idx", "Movie.2021.CAM.x264-BAD", 2),
            fixtures::raw_result("idx", "Movie.2021.2160p.WEB-DL.x265-UHD", 3),
            fixtures::raw_result("idx", "Movie.2021.1080p.BluRay.x264-OK", 4),
        ])
        .await;

    let mut preferences = Preferences::default();
    preferences.filters.min_seeders = 5;
    preferences.filters.disable_cam = true;
    preferences.filters.disable_4k = true;

    let resolution = harness
        .resolver
        .resolve(&StreamRequest::movie("tt0003", "Movie 2021").with_preferences(preferences))
        .await
        .unwrap();

    let titles: Vec<_> = resolution.streams.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Movie.2021.1080p.BluRay.x264-OK"]);
    assert_eq!(resolution.stats.rejections.seeders, 1);
    assert_eq!(resolution.stats.rejections.quality, 2);
}

#[tokio::test]
async fn test_failing_adapter_goes_down_and_is_skipped() {
    let harness = TestHarness::new(&["good", "flaky"]);
    harness
        .adapter(0)
        .set_results(vec![fixtures::raw_result("good", "Show.S01E01.1080p.WEB-DL", 1)])
        .await;
    harness
        .adapter(1)
        .set_error(AdapterError::Http {
            status: 502,
            message: "bad gateway".into(),
        })
        .await;

    let health = harness.resolver.health().clone();
    for episode in 1..=3 {
        let request = StreamRequest::episode("tt0004", "Show", 1, episode);
        harness.resolver.resolve(&request).await.unwrap();
        let expected = if episode < 3 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Down
        };
        assert_eq!(health.status("flaky").await, expected);
    }

    let resolution = harness
        .resolver
        .resolve(&StreamRequest::episode("tt0004", "Show", 1, 4))
        .await
        .unwrap();
    assert_eq!(resolution.stats.adapters_skipped, vec!["flaky".to_string()]);
    assert_eq!(harness.adapter(1).call_count().await, 3);

    // A manual reset brings it back immediately
    assert!(health.reset("flaky").await);
    assert_eq!(health.status("flaky").await, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_concurrent_identical_requests_share_one_search() {
    let harness = TestHarness::new(&["idx"]);
    harness
        .adapter(0)
        .set_results(vec![fixtures::raw_result("idx", "Movie.2022.1080p.WEB-DL", 1)])
        .await;
    harness.adapter(0).set_delay(Duration::from_millis(50)).await;
    harness.debrid.set_cached(&[fixtures::info_hash(1)]).await;

    let request = StreamRequest::movie("tt0005", "Movie 2022");
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let resolver = Arc::clone(&harness.resolver);
            let request = request.clone();
            tokio::spawn(async move { resolver.resolve(&request).await })
        })
        .collect();

    let mut resolutions = Vec::new();
    for handle in handles {
        resolutions.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(harness.adapter(0).call_count().await, 1);
    assert_eq!(harness.debrid.recorded_checks().await.len(), 1);
    assert!(resolutions
        .iter()
        .all(|r| r.streams == resolutions[0].streams));
    assert!(resolutions[0].streams[0].instantly_available);
}

#[tokio::test(start_paused = true)]
async fn test_result_cache_expires_after_ttl() {
    let harness = TestHarness::with_settings(
        &["idx"],
        ResolverSettings {
            cache_ttl: Duration::from_secs(60),
            ..Default::default()
        },
    );
    harness
        .adapter(0)
        .set_results(vec![fixtures::raw_result("idx", "Movie.2023.720p.HDTV", 1)])
        .await;
    let request = StreamRequest::movie("tt0006", "Movie 2023");

    assert!(!harness.resolver.resolve(&request).await.unwrap().from_cache);

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(harness.resolver.resolve(&request).await.unwrap().from_cache);
    assert_eq!(harness.adapter(0).call_count().await, 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(!harness.resolver.resolve(&request).await.unwrap().from_cache);
    assert_eq!(harness.adapter(0).call_count().await, 2);
}

#[tokio::test]
async fn test_only_cached_with_no_cached_results_is_empty_not_error() {
    let harness = TestHarness::new(&["idx"]);
    harness
        .adapter(0)
        .set_results(vec![fixtures::raw_result("idx", "Movie.2024.1080p.WEB-DL", 1)])
        .await;
    let preferences = Preferences {
        cache_filter: CacheFilter::OnlyCached,
        ..Default::default()
    };

    let resolution = harness
        .resolver
        .resolve(&StreamRequest::movie("tt0007", "Movie 2024").with_preferences(preferences))
        .await
        .unwrap();
    assert!(resolution.streams.is_empty());
    assert_eq!(resolution.summary.top_quality, "None");
}

#[tokio::test]
async fn test_no_enabled_adapters_is_distinct_error() {
    let harness = TestHarness::new(&[]);
    let result = harness
        .resolver
        .resolve(&StreamRequest::movie("tt0008", "Anything"))
        .await;
    assert!(matches!(result, Err(PipelineError::NoSourcesConfigured)));
}
