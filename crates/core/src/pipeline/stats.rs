//! Summary statistics over a resolved stream list.

use serde::Serialize;
use std::collections::BTreeMap;

use super::types::ResolvedStream;

/// Label reported for the top tracker/quality of an empty list.
pub const NONE_LABEL: &str = "None";

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StreamStatistics {
    pub total: usize,
    pub cached: usize,
    pub uncached: usize,
    /// Streams per tracker; a stream counts once for each tracker that reported it.
    pub per_tracker: BTreeMap<String, usize>,
    pub per_quality: BTreeMap<String, usize>,
    pub average_seeders: f64,
    pub total_size_bytes: u64,
    pub top_tracker: String,
    pub top_quality: String,
}

impl StreamStatistics {
    pub fn from_streams(streams: &[ResolvedStream]) -> Self {
        let mut per_tracker: BTreeMap<String, usize> = BTreeMap::new();
        let mut per_quality: BTreeMap<String, usize> = BTreeMap::new();
        let mut seeders: u64 = 0;
        let mut total_size_bytes: u64 = 0;
        let mut cached = 0;

        for stream in streams {
            if stream.instantly_available {
                cached += 1;
            }
            for tracker in &stream.trackers {
                *per_tracker.entry(tracker.clone()).or_default() += 1;
            }
            *per_quality.entry(stream.quality_tier.clone()).or_default() += 1;
            seeders += u64::from(stream.seeders.unwrap_or(0));
            total_size_bytes = total_size_bytes.saturating_add(stream.size_bytes.unwrap_or(0));
        }

        let average_seeders = if streams.is_empty() {
            0.0
        } else {
            seeders as f64 / streams.len() as f64
        };

        Self {
            total: streams.len(),
            cached,
            uncached: streams.len() - cached,
            top_tracker: top(&per_tracker),
            top_quality: top(&per_quality),
            per_tracker,
            per_quality,
            average_seeders,
            total_size_bytes,
        }
    }
}

/// Highest count wins; ties go to the alphabetically first key.
fn top(counts: &BTreeMap<String, usize>) -> String {
    let mut best: Option<(&String, usize)> = None;
    for (key, count) in counts {
        if best.is_none_or(|(_, c)| *count > c) {
            best = Some((key, *count));
        }
    }
    best.map(|(k, _)| k.clone())
        .unwrap_or_else(|| NONE_LABEL.to_string())
}

/// Human-readable size, binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
