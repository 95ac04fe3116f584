//! End-to-end stream resolution.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::{Coalescer, ResultCache};
use crate::config::Config;
use crate::debrid::{CacheAvailability, CacheResolver};
use crate::filter::{FilterPipeline, Filterable};
use crate::ranking::{compare, ParsedRelease, Ranker, ScoredResult};
use crate::searcher::{
    build_magnet, dedupe_grouped, distinct_hashes, enrich_magnet, AdapterRegistry,
    DedupStrategy, ProviderHealthMonitor, RawResult, SearchOrchestrator, TrackerLists,
};

use super::stats::{format_size, StreamStatistics};
use super::types::{
    CacheFilter, PipelineError, Preferences, ResolutionStats, ResolvedStream, StreamRequest,
    StreamResolution,
};

/// Tunables for a `StreamResolver`.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub search_timeout: Duration,
    pub dedup_strategies: Vec<DedupStrategy>,
    pub cache_ttl: Duration,
    pub default_preferences: Preferences,
    pub trackers: TrackerLists,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let config = Config::default();
        Self::from_config(&config)
    }
}

impl ResolverSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_timeout: config.search.timeout(),
            dedup_strategies: config.search.dedup_strategies.clone(),
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
            default_preferences: config.preferences.clone(),
            trackers: config.trackers.clone(),
        }
    }
}

struct Inner {
    orchestrator: SearchOrchestrator,
    ranker: Ranker,
    debrid: CacheResolver,
    cache: Arc<ResultCache<StreamResolution>>,
    settings: ResolverSettings,
}

/// Turns a stream request into an ordered, annotated list of streams.
///
/// Identical concurrent requests share one execution, and results are
/// memoized for the configured TTL.
pub struct StreamResolver {
    inner: Arc<Inner>,
    coalescer: Coalescer<StreamResolution, PipelineError>,
}

impl StreamResolver {
    pub fn new(
        orchestrator: SearchOrchestrator,
        ranker: Ranker,
        debrid: CacheResolver,
        settings: ResolverSettings,
    ) -> Self {
        let cache = Arc::new(ResultCache::new(settings.cache_ttl));
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                ranker,
                debrid,
                cache,
                settings,
            }),
            coalescer: Coalescer::new(),
        }
    }

    /// Build every collaborator from configuration.
    pub fn from_config(
        config: &Config,
        health: Arc<ProviderHealthMonitor>,
    ) -> Result<Self, PipelineError> {
        let registry = AdapterRegistry::from_config(&config.adapters)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        let debrid = CacheResolver::from_config(&config.debrid)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        let ranker = Ranker::new(config.ranking.clone().unwrap_or_default());
        let orchestrator = SearchOrchestrator::new(Arc::new(registry), health);
        Ok(Self::new(
            orchestrator,
            ranker,
            debrid,
            ResolverSettings::from_config(config),
        ))
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        self.inner.orchestrator.registry()
    }

    pub fn health(&self) -> &Arc<ProviderHealthMonitor> {
        self.inner.orchestrator.health()
    }

    pub fn cache(&self) -> &Arc<ResultCache<StreamResolution>> {
        &self.inner.cache
    }

    pub fn debrid(&self) -> &CacheResolver {
        &self.inner.debrid
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.inner.settings
    }

    /// Requests currently executing.
    pub fn in_flight(&self) -> usize {
        self.coalescer.pending_count()
    }

    pub async fn resolve(&self, request: &StreamRequest) -> Result<StreamResolution, PipelineError> {
        request.validate()?;
        let preferences = request
            .preferences
            .clone()
            .unwrap_or_else(|| self.inner.settings.default_preferences.clone());
        preferences.validate()?;

        let key = request.fingerprint(&preferences)?;
        let inner = Arc::clone(&self.inner);
        let request = request.clone();
        let cache_key = key.clone();
        self.coalescer
            .wrap(&key, move || async move {
                inner.run(&cache_key, &request, &preferences).await
            })
            .await
    }

    /// Resolve a magnet to a direct link through the named service.
    pub async fn accelerated_link(
        &self,
        service: &str,
        magnet: &str,
    ) -> Result<Option<String>, PipelineError> {
        let handle = self
            .inner
            .debrid
            .service(service)
            .ok_or_else(|| PipelineError::UnknownService(service.to_string()))?;
        Ok(handle.get_accelerated_link(magnet).await?)
    }
}

/// A deduplicated, scored result with its provenance.
struct Candidate {
    scored: ScoredResult,
    trackers: Vec<String>,
    announce: Vec<String>,
}

impl Filterable for Candidate {
    fn raw(&self) -> &RawResult {
        &self.scored.raw
    }

    fn parsed(&self) -> Cow<'_, ParsedRelease> {
        Cow::Borrowed(&self.scored.parsed)
    }
}

impl Inner {
    async fn run(
        &self,
        key: &str,
        request: &StreamRequest,
        preferences: &Preferences,
    ) -> Result<StreamResolution, PipelineError> {
        if let Some(mut hit) = self.cache.get(key).await {
            debug!(media_id = %request.media_id, "Serving streams from result cache");
            hit.from_cache = true;
            return Ok(hit);
        }

        let started = Instant::now();
        let query = request.search_query();
        let report = self
            .orchestrator
            .search(
                &query,
                request.adapters.as_deref(),
                self.settings.search_timeout,
            )
            .await;
        if report.no_sources {
            return Err(PipelineError::NoSourcesConfigured);
        }

        let mut stats = ResolutionStats {
            adapters_queried: report.adapters.len(),
            adapters_succeeded: report.succeeded(),
            adapters_failed: report.failed(),
            adapters_timed_out: report.timed_out(),
            adapters_skipped: report.skipped.clone(),
            raw_results: report.results.len(),
            search_elapsed_ms: report.elapsed_ms,
            ..Default::default()
        };

        let groups = dedupe_grouped(report.results, &self.settings.dedup_strategies);
        stats.deduplicated = groups.len();

        let candidates: Vec<Candidate> = groups
            .into_iter()
            .map(|group| Candidate {
                scored: self.ranker.score_one(group.result),
                trackers: group.trackers,
                announce: group.announce,
            })
            .collect();

        let outcome = FilterPipeline::new(preferences.filters.clone())
            .for_episode(request.episode_target())
            .apply(candidates);
        stats.rejections = outcome.stats;
        stats.after_filters = outcome.kept.len();

        let mut candidates = outcome.kept;
        candidates.sort_by(|a, b| compare(preferences.sort, &a.scored, &b.scored));

        let hashes = distinct_hashes(candidates.iter().map(|c| &c.scored.raw));
        let availability = if hashes.is_empty() {
            CacheAvailability::default()
        } else {
            self.debrid.resolve(&hashes).await
        };

        let streams: Vec<ResolvedStream> = candidates
            .into_iter()
            .map(|c| to_stream(c, &availability, &self.settings.trackers))
            .collect();
        let streams = apply_cache_filter(streams, preferences.cache_filter);
        let streams = cap_per_tier(streams, preferences.max_per_quality);

        stats.cached = streams.iter().filter(|s| s.instantly_available).count();
        stats.returned = streams.len();

        let resolution = StreamResolution {
            summary: StreamStatistics::from_streams(&streams),
            streams,
            stats,
            from_cache: false,
        };

        // An empty list caused by failing adapters is not worth pinning.
        let transient = resolution.streams.is_empty()
            && (resolution.stats.adapters_failed > 0 || resolution.stats.adapters_timed_out > 0);
        if !transient {
            self.cache.insert(key, resolution.clone()).await;
        }

        info!(
            media_id = %request.media_id,
            query = %query.query,
            raw = resolution.stats.raw_results,
            deduplicated = resolution.stats.deduplicated,
            filtered = resolution.stats.after_filters,
            returned = resolution.stats.returned,
            cached = resolution.stats.cached,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Resolved streams"
        );
        Ok(resolution)
    }
}

fn to_stream(
    candidate: Candidate,
    availability: &CacheAvailability,
    lists: &TrackerLists,
) -> ResolvedStream {
    let Candidate {
        scored,
        trackers,
        announce,
    } = candidate;
    let cached_services = scored
        .info_hash
        .as_deref()
        .map(|h| availability.services_for(h))
        .unwrap_or_default();
    let instantly_available = !cached_services.is_empty();

    let mut name = format!("YARR!\n{}", scored.quality_tier);
    for hdr in &scored.parsed.hdr {
        name.push(' ');
        name.push_str(hdr.as_str());
    }
    if instantly_available {
        name = format!("[+] {}", name);
    }

    let mut description = format!(
        "{}\n{} seeders | {} | {}",
        scored.raw.name,
        scored.seeders(),
        scored
            .raw
            .size_bytes
            .map(format_size)
            .unwrap_or_else(|| "unknown size".to_string()),
        trackers.join(", ")
    );
    if instantly_available {
        description.push_str(&format!("\nCached on {}", cached_services.join(", ")));
    }

    let uri = stream_uri(&scored, &trackers, &announce, lists);

    ResolvedStream {
        name,
        description,
        uri,
        info_hash: scored.info_hash,
        size_bytes: scored.raw.size_bytes,
        seeders: scored.raw.seeders,
        quality_tier: scored.quality_tier,
        score: scored.score,
        title: scored.raw.name,
        trackers,
        instantly_available,
        cached_services,
    }
}

/// Output link for a stream.
///
/// An adapter magnet is kept and extended; a hash without one gets a fresh
/// magnet; anything else (a bare .torrent URL) passes through untouched.
fn stream_uri(
    scored: &ScoredResult,
    trackers: &[String],
    announce: &[String],
    lists: &TrackerLists,
) -> String {
    let label = trackers.first().map(String::as_str).unwrap_or(&scored.raw.tracker);
    let announce = lists.merge(announce, label);
    if scored.raw.is_magnet() {
        enrich_magnet(&scored.raw.download_uri, &scored.raw.name, &announce)
    } else if let Some(hash) = &scored.info_hash {
        build_magnet(hash, &scored.raw.name, &announce)
    } else {
        scored.raw.download_uri.clone()
    }
}

/// Apply the cache-filter mode. Relative order within each partition is kept.
pub fn apply_cache_filter(streams: Vec<ResolvedStream>, mode: CacheFilter) -> Vec<ResolvedStream> {
    match mode {
        CacheFilter::ShowAll => streams,
        CacheFilter::OnlyCached => streams
            .into_iter()
            .filter(|s| s.instantly_available)
            .collect(),
        CacheFilter::PreferCached => {
            let (mut cached, uncached): (Vec<_>, Vec<_>) =
                streams.into_iter().partition(|s| s.instantly_available);
            cached.extend(uncached);
            cached
        }
    }
}

/// Keep at most `max` streams per quality tier, preserving order.
pub fn cap_per_tier(streams: Vec<ResolvedStream>, max: usize) -> Vec<ResolvedStream> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    streams
        .into_iter()
        .filter(|s| {
            let count = counts.entry(s.quality_tier.clone()).or_default();
            *count += 1;
            *count <= max
        })
        .collect()
}
