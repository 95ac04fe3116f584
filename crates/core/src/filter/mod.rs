//! Filter pipeline.
//!
//! Each predicate is a pure function of one result and the constraints. A
//! result is dropped by the first predicate it fails; survivors keep their
//! relative order, and rejections are counted per predicate.

mod constraints;

pub use constraints::{EpisodeTarget, FilterConstraints};

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::debug;

use crate::metrics;
use crate::ranking::{parse_release, ParsedRelease, ScoredResult};
use crate::searcher::RawResult;

/// Anything the pipeline can filter: a raw result plus its parsed attributes.
pub trait Filterable {
    fn raw(&self) -> &RawResult;
    fn parsed(&self) -> Cow<'_, ParsedRelease>;
}

impl Filterable for RawResult {
    fn raw(&self) -> &RawResult {
        self
    }

    fn parsed(&self) -> Cow<'_, ParsedRelease> {
        Cow::Owned(parse_release(&self.name))
    }
}

impl Filterable for ScoredResult {
    fn raw(&self) -> &RawResult {
        &self.raw
    }

    fn parsed(&self) -> Cow<'_, ParsedRelease> {
        Cow::Borrowed(&self.parsed)
    }
}

/// Filter predicates, in evaluation order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Seeders,
    Category,
    Adult,
    Format,
    Quality,
    SeasonEpisode,
}

impl Predicate {
    pub const ALL: [Predicate; 6] = [
        Predicate::Seeders,
        Predicate::Category,
        Predicate::Adult,
        Predicate::Format,
        Predicate::Quality,
        Predicate::SeasonEpisode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::Seeders => "seeders",
            Predicate::Category => "category",
            Predicate::Adult => "adult",
            Predicate::Format => "format",
            Predicate::Quality => "quality",
            Predicate::SeasonEpisode => "season_episode",
        }
    }
}

/// Aggregate rejection counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterStats {
    pub seeders: usize,
    pub category: usize,
    pub adult: usize,
    pub format: usize,
    pub quality: usize,
    pub season_episode: usize,
}

impl FilterStats {
    fn record(&mut self, predicate: Predicate) {
        match predicate {
            Predicate::Seeders => self.seeders += 1,
            Predicate::Category => self.category += 1,
            Predicate::Adult => self.adult += 1,
            Predicate::Format => self.format += 1,
            Predicate::Quality => self.quality += 1,
            Predicate::SeasonEpisode => self.season_episode += 1,
        }
    }

    pub fn get(&self, predicate: Predicate) -> usize {
        match predicate {
            Predicate::Seeders => self.seeders,
            Predicate::Category => self.category,
            Predicate::Adult => self.adult,
            Predicate::Format => self.format,
            Predicate::Quality => self.quality,
            Predicate::SeasonEpisode => self.season_episode,
        }
    }

    pub fn total(&self) -> usize {
        Predicate::ALL.iter().map(|p| self.get(*p)).sum()
    }
}

/// Survivors plus rejection counts.
#[derive(Debug, Clone)]
pub struct FilterOutcome<T> {
    pub kept: Vec<T>,
    pub stats: FilterStats,
}

/// Minimum-seeders check. Unknown seeders count as zero.
pub fn passes_seeders(raw: &RawResult, constraints: &FilterConstraints) -> bool {
    raw.seeders_or_zero() >= constraints.min_seeders
}

pub fn passes_category(raw: &RawResult, constraints: &FilterConstraints) -> bool {
    let Some(category) = raw.category.as_deref() else {
        return true;
    };
    let category = category.to_lowercase();
    !constraints
        .blocked_categories
        .iter()
        .any(|blocked| !blocked.is_empty() && category.contains(&blocked.to_lowercase()))
}

pub fn passes_adult(raw: &RawResult, constraints: &FilterConstraints) -> bool {
    if !constraints.remove_adult {
        return true;
    }
    let name = raw.name.to_lowercase();
    let category = raw.category.as_deref().unwrap_or_default().to_lowercase();
    !constraints.adult_keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        !keyword.is_empty() && (name.contains(&keyword) || category.contains(&keyword))
    })
}

/// Codec block. Punctuation is stripped first so `H.265` and `x.265` match.
pub fn passes_format(raw: &RawResult, constraints: &FilterConstraints) -> bool {
    if !constraints.block_hevc {
        return true;
    }
    let squashed: String = raw
        .name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect();
    !["x265", "h265", "hevc"].iter().any(|t| squashed.contains(t))
}

pub fn passes_quality(parsed: &ParsedRelease, constraints: &FilterConstraints) -> bool {
    if constraints.disable_4k && parsed.is_4k() {
        return false;
    }
    if constraints.disable_cam && parsed.is_cam() {
        return false;
    }
    if constraints.disable_hdr && parsed.has_hdr() {
        return false;
    }
    if constraints.disable_dolby_vision && parsed.has_dolby_vision() {
        return false;
    }
    if constraints.disable_3d && parsed.is_3d {
        return false;
    }
    if constraints.disable_remux && parsed.is_remux() {
        return false;
    }
    match parsed.resolution {
        Some(resolution) => !constraints.blocked_resolutions.contains(&resolution),
        None => true,
    }
}

/// Names without season/episode markers pass. A season pack passes when it
/// covers the season. Explicit episodes must match both numbers.
pub fn passes_season_episode(parsed: &ParsedRelease, target: Option<EpisodeTarget>) -> bool {
    let Some(target) = target else {
        return true;
    };
    let info = &parsed.episode;
    if info.is_empty() {
        return true;
    }
    let season_ok = info.seasons.is_empty() || info.seasons.contains(&target.season);
    if info.is_season_pack() {
        return season_ok;
    }
    season_ok && info.episodes.contains(&target.episode)
}

/// Constraints plus the per-request episode target.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    constraints: FilterConstraints,
    target: Option<EpisodeTarget>,
}

impl FilterPipeline {
    pub fn new(constraints: FilterConstraints) -> Self {
        Self {
            constraints,
            target: None,
        }
    }

    pub fn for_episode(mut self, target: Option<EpisodeTarget>) -> Self {
        self.target = target;
        self
    }

    pub fn constraints(&self) -> &FilterConstraints {
        &self.constraints
    }

    /// First predicate the item fails, if any.
    pub fn rejection<T: Filterable>(&self, item: &T) -> Option<Predicate> {
        let raw = item.raw();
        if !passes_seeders(raw, &self.constraints) {
            return Some(Predicate::Seeders);
        }
        if !passes_category(raw, &self.constraints) {
            return Some(Predicate::Category);
        }
        if !passes_adult(raw, &self.constraints) {
            return Some(Predicate::Adult);
        }
        if !passes_format(raw, &self.constraints) {
            return Some(Predicate::Format);
        }
        let parsed = item.parsed();
        if !passes_quality(&parsed, &self.constraints) {
            return Some(Predicate::Quality);
        }
        if !passes_season_episode(&parsed, self.target) {
            return Some(Predicate::SeasonEpisode);
        }
        None
    }

    pub fn apply<T: Filterable>(&self, items: Vec<T>) -> FilterOutcome<T> {
        let before = items.len();
        let mut stats = FilterStats::default();
        let mut kept = Vec::with_capacity(items.len());

        for item in items {
            match self.rejection(&item) {
                Some(predicate) => {
                    stats.record(predicate);
                    metrics::FILTER_REJECTIONS
                        .with_label_values(&[predicate.as_str()])
                        .inc();
                }
                None => kept.push(item),
            }
        }

        if stats.total() > 0 {
            debug!(
                before = before,
                after = kept.len(),
                seeders = stats.seeders,
                category = stats.category,
                adult = stats.adult,
                format = stats.format,
                quality = stats.quality,
                season_episode = stats.season_episode,
                "Filtered results"
            );
        }

        FilterOutcome { kept, stats }
    }
}

/// Filter with the given constraints and optional episode target.
pub fn filter<T: Filterable>(
    items: Vec<T>,
    constraints: &FilterConstraints,
    target: Option<EpisodeTarget>,
) -> FilterOutcome<T> {
    FilterPipeline::new(constraints.clone())
        .for_episode(target)
        .apply(items)
}
