//! Deduplication of raw search results across adapters.
//!
//! Each strategy derives zero or more keys per result. A result is dropped if
//! any of its keys was already seen; otherwise all of its keys are marked as
//! seen and the result is kept. The decision is a strategy union, so strategy
//! order only affects key generation, never which results survive.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::ranking::parse_release;

use super::magnet::announce_urls;
use super::RawResult;

/// Bucket width for the smart-hash size component.
const SIZE_BUCKET_BYTES: u64 = 100_000_000;

static VIDEO_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mkv|mp4|avi|mov|wmv)$").unwrap());

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Canonical info hash.
    Infohash,
    /// Rounded size plus resolution, codec and source tokens.
    SmartHash,
    /// Exact `(tracker, name)` pair.
    TrackerName,
    /// Name with extension and punctuation stripped, lowercased.
    Filename,
}

impl DedupStrategy {
    /// Strategies used by the resolution pipeline unless configured otherwise.
    pub fn defaults() -> Vec<DedupStrategy> {
        vec![
            DedupStrategy::Infohash,
            DedupStrategy::SmartHash,
            DedupStrategy::TrackerName,
        ]
    }

    fn key(&self, result: &RawResult) -> Option<String> {
        match self {
            DedupStrategy::Infohash => result
                .canonical_info_hash()
                .map(|h| format!("infohash:{}", h)),
            DedupStrategy::SmartHash => smart_hash(result).map(|h| format!("smart:{}", h)),
            DedupStrategy::TrackerName => {
                Some(format!("tracker:{}:{}", result.tracker, result.name))
            }
            DedupStrategy::Filename => {
                let stripped = VIDEO_EXTENSION.replace(&result.name, "");
                let normalized: String = stripped
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .flat_map(|c| c.to_lowercase())
                    .collect();
                (!normalized.is_empty()).then(|| format!("filename:{}", normalized))
            }
        }
    }
}

/// Smart-hash key. Requires a known size: without one, every unsized release
/// with the same tokens would collapse together.
fn smart_hash(result: &RawResult) -> Option<String> {
    let size = result.size_bytes.filter(|s| *s > 0)?;
    let bucket = (size + SIZE_BUCKET_BYTES / 2) / SIZE_BUCKET_BYTES;
    let parsed = parse_release(&result.name);
    Some(format!(
        "{}:{}:{}:{}",
        bucket,
        parsed.resolution.map(|r| r.as_str()).unwrap_or("-"),
        parsed.codec.map(|c| c.as_str()).unwrap_or("-"),
        parsed.source.map(|s| s.as_str()).unwrap_or("-"),
    ))
}

/// A surviving result plus every adapter that reported the same release.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupGroup {
    pub result: RawResult,
    /// Provenance, first-seen order, no repeats.
    pub trackers: Vec<String>,
    /// Announce URLs from every merged magnet, first-seen order, no repeats.
    pub announce: Vec<String>,
}

impl DedupGroup {
    fn new(result: RawResult) -> Self {
        Self {
            trackers: vec![result.tracker.clone()],
            announce: announce_urls(&result.download_uri),
            result,
        }
    }

    /// Fold a duplicate into the group.
    ///
    /// Fields that feed a dedup key (name, size, link) stay those of the first
    /// occurrence. Seeders and peers take the best value any duplicate reported.
    fn absorb(&mut self, duplicate: RawResult) {
        for url in announce_urls(&duplicate.download_uri) {
            if !self.announce.contains(&url) {
                self.announce.push(url);
            }
        }

        let kept = &mut self.result;
        kept.seeders = kept.seeders.max(duplicate.seeders);
        kept.peers = kept.peers.max(duplicate.peers);

        if !self.trackers.contains(&duplicate.tracker) {
            self.trackers.push(duplicate.tracker);
        }
    }
}

/// Collapse duplicates, keeping the first occurrence of each release and
/// folding the dropped ones into it.
pub fn dedupe_grouped(results: Vec<RawResult>, strategies: &[DedupStrategy]) -> Vec<DedupGroup> {
    let before = results.len();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DedupGroup> = Vec::new();

    for result in results {
        let keys: Vec<String> = strategies.iter().filter_map(|s| s.key(&result)).collect();

        match keys.iter().find_map(|k| seen.get(k).copied()) {
            Some(index) => groups[index].absorb(result),
            None => {
                let index = groups.len();
                for key in keys {
                    seen.insert(key, index);
                }
                groups.push(DedupGroup::new(result));
            }
        }
    }

    debug!(
        before = before,
        after = groups.len(),
        removed = before - groups.len(),
        "Deduplication complete"
    );
    groups
}

/// Drop duplicates. Idempotent: `dedupe(dedupe(x)) == dedupe(x)`.
pub fn dedupe(results: Vec<RawResult>, strategies: &[DedupStrategy]) -> Vec<RawResult> {
    dedupe_grouped(results, strategies)
        .into_iter()
        .map(|g| g.result)
        .collect()
}

/// Distinct info hashes among results, in first-seen order.
pub fn distinct_hashes<'a>(results: impl IntoIterator<Item = &'a RawResult>) -> Vec<String> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter_map(|r| r.canonical_info_hash())
        .filter(|h| seen.insert(h.clone()))
        .collect()
}
