//! Request, preference and response types for stream resolution.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::cache::CoalesceError;
use crate::debrid::DebridError;
use crate::filter::{EpisodeTarget, FilterConstraints, FilterStats};
use crate::ranking::{ScoreBreakdown, SortMode};
use crate::searcher::{AdapterEndpoint, MediaCategory, SearchQuery};

use super::stats::StreamStatistics;

/// Inclusive bounds for `Preferences::max_per_quality`.
pub const MAX_PER_QUALITY_RANGE: std::ops::RangeInclusive<usize> = 1..=20;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("No source adapters are configured or enabled")]
    NoSourcesConfigured,

    #[error("Invalid preferences: {0}")]
    InvalidPreferences(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown acceleration service: {0}")]
    UnknownService(String),

    #[error("Acceleration service error: {0}")]
    Debrid(#[from] DebridError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CoalesceError> for PipelineError {
    fn from(e: CoalesceError) -> Self {
        PipelineError::Internal(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Movie,
    Series,
}

impl ContentKind {
    pub fn category(&self) -> MediaCategory {
        match self {
            ContentKind::Movie => MediaCategory::Movie,
            ContentKind::Series => MediaCategory::Show,
        }
    }
}

/// How acceleration availability shapes the returned list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CacheFilter {
    /// Every surviving result, ordered by the sort mode alone.
    ShowAll,
    /// Only results at least one service reports as instantly available.
    OnlyCached,
    /// Instantly available results first, then the rest.
    #[default]
    PreferCached,
}

/// Caller preferences: filter constraints plus ordering and output shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    pub filters: FilterConstraints,
    pub sort: SortMode,
    pub cache_filter: CacheFilter,
    /// Cap on results returned per quality tier.
    pub max_per_quality: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            filters: FilterConstraints::default(),
            sort: SortMode::default(),
            cache_filter: CacheFilter::default(),
            max_per_quality: 5,
        }
    }
}

impl Preferences {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !MAX_PER_QUALITY_RANGE.contains(&self.max_per_quality) {
            return Err(PipelineError::InvalidPreferences(format!(
                "max_per_quality must be between {} and {}, got {}",
                MAX_PER_QUALITY_RANGE.start(),
                MAX_PER_QUALITY_RANGE.end(),
                self.max_per_quality
            )));
        }
        Ok(())
    }
}

/// One stream lookup: a movie, or one episode of a series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamRequest {
    pub kind: ContentKind,
    /// External identifier of the title (e.g. an IMDb id).
    pub media_id: String,
    /// Title used as the search text.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Restrict the fan-out to these adapters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapters: Option<Vec<String>>,
    /// Per-adapter endpoint overrides.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub endpoints: HashMap<String, AdapterEndpoint>,
    /// Falls back to the configured defaults when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

impl StreamRequest {
    pub fn movie(media_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Movie,
            media_id: media_id.into(),
            title: title.into(),
            season: None,
            episode: None,
            adapters: None,
            endpoints: HashMap::new(),
            preferences: None,
        }
    }

    pub fn episode(
        media_id: impl Into<String>,
        title: impl Into<String>,
        season: u32,
        episode: u32,
    ) -> Self {
        Self {
            kind: ContentKind::Series,
            season: Some(season),
            episode: Some(episode),
            ..Self::movie(media_id, title)
        }
    }

    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_adapters(mut self, adapters: &[&str]) -> Self {
        self.adapters = Some(adapters.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.title.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "title must not be empty".to_string(),
            ));
        }
        if self.kind == ContentKind::Series && self.season.is_none() {
            return Err(PipelineError::InvalidRequest(
                "series requests need a season".to_string(),
            ));
        }
        if self.episode.is_some() && self.season.is_none() {
            return Err(PipelineError::InvalidRequest(
                "an episode needs a season".to_string(),
            ));
        }
        Ok(())
    }

    /// Free-text query sent to every adapter.
    pub fn query_text(&self) -> String {
        let title = self.title.trim();
        match (self.kind, self.season, self.episode) {
            (ContentKind::Series, Some(s), Some(e)) => format!("{} S{:02}E{:02}", title, s, e),
            (ContentKind::Series, Some(s), None) => format!("{} S{:02}", title, s),
            _ => title.to_string(),
        }
    }

    pub fn search_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new(self.query_text()).with_category(self.kind.category());
        query.endpoints = self.endpoints.clone();
        query
    }

    /// Season/episode the filter pipeline enforces.
    pub fn episode_target(&self) -> Option<EpisodeTarget> {
        match (self.kind, self.season, self.episode) {
            (ContentKind::Series, Some(s), Some(e)) => Some(EpisodeTarget::new(s, e)),
            _ => None,
        }
    }

    /// Stable key for coalescing and caching: SHA-256 of the canonical JSON
    /// of this request with the effective preferences.
    pub fn fingerprint(&self, preferences: &Preferences) -> Result<String, PipelineError> {
        let mut adapters: Option<Vec<&str>> = self
            .adapters
            .as_ref()
            .map(|list| list.iter().map(String::as_str).collect());
        if let Some(list) = adapters.as_mut() {
            list.sort_unstable();
            list.dedup();
        }
        let canonical = Canonical {
            kind: self.kind,
            media_id: &self.media_id,
            query: self.query_text(),
            season: self.season,
            episode: self.episode,
            adapters,
            endpoints: self.endpoints.iter().collect(),
            preferences,
        };
        let json = serde_json::to_vec(&canonical)
            .map_err(|e| PipelineError::Internal(format!("fingerprint: {}", e)))?;
        Ok(format!("{:x}", Sha256::digest(&json)))
    }
}

#[derive(Serialize)]
struct Canonical<'a> {
    kind: ContentKind,
    media_id: &'a str,
    query: String,
    season: Option<u32>,
    episode: Option<u32>,
    adapters: Option<Vec<&'a str>>,
    endpoints: BTreeMap<&'a String, &'a AdapterEndpoint>,
    preferences: &'a Preferences,
}

/// A ranked, annotated result ready for display.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedStream {
    /// Short display label: quality tier and HDR formats.
    pub name: String,
    /// Multi-line description: release name, seeders/size/trackers, cache status.
    pub description: String,
    /// Release name as reported by the source.
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    /// Magnet URI when the info hash is known, else the source's download URI.
    pub uri: String,
    /// Every adapter that returned this release, first-seen order.
    pub trackers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    pub quality_tier: String,
    pub score: ScoreBreakdown,
    pub instantly_available: bool,
    /// Services reporting the release as instantly available, config order.
    pub cached_services: Vec<String>,
}

/// Counters describing one resolution.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ResolutionStats {
    pub adapters_queried: usize,
    pub adapters_succeeded: usize,
    pub adapters_failed: usize,
    pub adapters_timed_out: usize,
    /// Adapters skipped because their health record is down.
    pub adapters_skipped: Vec<String>,
    pub raw_results: usize,
    pub deduplicated: usize,
    pub after_filters: usize,
    pub rejections: FilterStats,
    pub cached: usize,
    pub returned: usize,
    pub search_elapsed_ms: u64,
}

/// Response of `StreamResolver::resolve`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamResolution {
    pub streams: Vec<ResolvedStream>,
    pub stats: ResolutionStats,
    pub summary: StreamStatistics,
    /// True when served from the result cache.
    pub from_cache: bool,
}
