//! Result ordering.
//!
//! Every mode falls through to descending seeders, then name, then info hash,
//! so the final order never depends on the order results arrived in.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::ScoredResult;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    QualityThenSeeders,
    QualityThenSize,
    Quality,
    Seeders,
    Size,
}

fn by_score(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.score.total_score.total_cmp(&a.score.total_score)
}

fn by_seeders(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.seeders().cmp(&a.seeders())
}

fn by_size(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.size_bytes().cmp(&a.size_bytes())
}

fn tie_break(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    by_seeders(a, b)
        .then_with(|| a.raw.name.cmp(&b.raw.name))
        .then_with(|| a.info_hash.cmp(&b.info_hash))
        .then_with(|| a.raw.tracker.cmp(&b.raw.tracker))
}

/// Total order for `mode`.
pub fn compare(mode: SortMode, a: &ScoredResult, b: &ScoredResult) -> Ordering {
    let primary = match mode {
        SortMode::QualityThenSeeders | SortMode::Quality => by_score(a, b),
        SortMode::QualityThenSize => by_score(a, b).then_with(|| by_size(a, b)),
        SortMode::Seeders => by_seeders(a, b).then_with(|| by_score(a, b)),
        SortMode::Size => by_size(a, b).then_with(|| by_score(a, b)),
    };
    primary.then_with(|| tie_break(a, b))
}

pub fn sort_results(results: &mut [ScoredResult], mode: SortMode) {
    results.sort_by(|a, b| compare(mode, a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::Ranker;
    use crate::testing::fixtures;

    fn scored(name: &str, seeders: u32, size: u64, seed: u32) -> ScoredResult {
        let mut raw = fixtures::raw_result("t", name, seed.into());
        raw.seeders = Some(seeders);
        raw.size_bytes = Some(size);
        Ranker::default().score_one(raw)
    }

    #[test]
    fn test_equal_scores_break_ties_by_seeders() {
        // Seeder bonus is part of the score, so equalize it explicitly.
        let mut low = scored("Movie.1080p.WEB-DL", 5, 1, 1);
        let mut high = scored("Movie.1080p.WEB-DL", 500, 1, 2);
        low.score.total_score = 100.0;
        high.score.total_score = 100.0;

        let mut results = vec![low.clone(), high.clone()];
        sort_results(&mut results, SortMode::QualityThenSeeders);
        assert_eq!(results[0].seeders(), 500);

        let mut results = vec![high, low];
        sort_results(&mut results, SortMode::Quality);
        assert_eq!(results[0].seeders(), 500);
    }

    #[test]
    fn test_order_independent_of_input_order() {
        let a = scored("A.1080p.WEB-DL", 10, 1, 1);
        let b = scored("B.1080p.WEB-DL", 10, 1, 2);
        let c = scored("C.720p.HDTV", 10, 1, 3);

        let mut forward = vec![a.clone(), b.clone(), c.clone()];
        let mut reverse = vec![c, b, a];
        sort_results(&mut forward, SortMode::QualityThenSeeders);
        sort_results(&mut reverse, SortMode::QualityThenSeeders);
        assert_eq!(forward, reverse);
        assert_eq!(forward[0].raw.name, "A.1080p.WEB-DL");
    }

    #[test]
    fn test_size_and_seeders_modes() {
        let gib = 1024 * 1024 * 1024;
        let small_popular = scored("Movie.720p.HDTV", 900, gib, 1);
        let big_rare = scored("Movie.720p.HDTV", 2, 20 * gib, 2);

        let mut results = vec![small_popular.clone(), big_rare.clone()];
        sort_results(&mut results, SortMode::Size);
        assert_eq!(results[0].size_bytes(), 20 * gib);

        sort_results(&mut results, SortMode::Seeders);
        assert_eq!(results[0].seeders(), 900);
    }

    #[test]
    fn test_sort_mode_serialization() {
        let mode: SortMode = serde_json::from_str("\"quality_then_size\"").unwrap();
        assert_eq!(mode, SortMode::QualityThenSize);
        assert_eq!(SortMode::default(), SortMode::QualityThenSeeders);
    }
}
