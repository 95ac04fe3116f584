//! Release ranking.
//!
//! Parses release names into quality attributes, scores them against a
//! configurable point table, and orders results deterministically.

mod parser;
mod score;
mod sort;

pub use parser::{
    parse_release, Audio, Codec, EpisodeInfo, Hdr, ParsedRelease, Resolution, Source,
};
pub use score::{quality_tier, score, ScoreBreakdown, ScoreTable};
pub use sort::{compare, sort_results, SortMode};

use serde::Serialize;

use crate::searcher::RawResult;

/// A raw result with its parsed attributes and score. Read-only once built.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredResult {
    pub raw: RawResult,
    /// Canonical lowercase 40-hex info hash, when derivable.
    pub info_hash: Option<String>,
    pub parsed: ParsedRelease,
    pub score: ScoreBreakdown,
    pub quality_tier: String,
}

impl ScoredResult {
    pub fn seeders(&self) -> u32 {
        self.raw.seeders_or_zero()
    }

    pub fn size_bytes(&self) -> u64 {
        self.raw.size_bytes.unwrap_or(0)
    }
}

/// Scores results against a table.
#[derive(Debug, Clone, Default)]
pub struct Ranker {
    table: ScoreTable,
}

impl Ranker {
    pub fn new(table: ScoreTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ScoreTable {
        &self.table
    }

    pub fn score_one(&self, raw: RawResult) -> ScoredResult {
        let parsed = parse_release(&raw.name);
        let score = self.table.score_parsed(&parsed, raw.size_bytes, raw.seeders);
        ScoredResult {
            info_hash: raw.canonical_info_hash(),
            quality_tier: quality_tier(&parsed),
            parsed,
            score,
            raw,
        }
    }

    /// Score every result and order them by `mode`.
    pub fn rank(&self, results: Vec<RawResult>, mode: SortMode) -> Vec<ScoredResult> {
        let mut scored: Vec<_> = results.into_iter().map(|r| self.score_one(r)).collect();
        sort_results(&mut scored, mode);
        scored
    }
}
