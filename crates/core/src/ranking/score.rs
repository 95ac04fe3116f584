//! Deterministic composite scoring from parsed release attributes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::parser::{parse_release, ParsedRelease, Resolution};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Point tables used by the ranker.
///
/// Keys are the attribute labels produced by the parser (`"1080p"`,
/// `"WEB-DL"`, `"HEVC"`, `"Atmos"`, `"DV"`, ...). Unknown attributes score 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoreTable {
    pub resolution: BTreeMap<String, f64>,
    /// Applied when no resolution marker is present.
    pub unknown_resolution: f64,
    pub source: BTreeMap<String, f64>,
    pub codec: BTreeMap<String, f64>,
    pub audio: BTreeMap<String, f64>,
    pub hdr: BTreeMap<String, f64>,
    /// Compared case-insensitively against the parsed release group.
    pub trusted_groups: Vec<String>,
    pub trusted_group_bonus: f64,
    pub repack_proper_bonus: f64,
    /// Multiplier for `log10(seeders + 1)`.
    pub seeder_weight: f64,
    pub size_bonus: f64,
    pub size_bonus_min_gib: f64,
    pub size_bonus_max_gib: f64,
    pub oversize_penalty: f64,
    pub oversize_threshold_gib: f64,
}

fn table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            resolution: table(&[
                ("2160p", 100.0),
                ("1440p", 90.0),
                ("1080p", 80.0),
                ("720p", 60.0),
                ("576p", 40.0),
                ("480p", 30.0),
                ("360p", 20.0),
            ]),
            unknown_resolution: 0.0,
            source: table(&[
                ("BluRay", 100.0),
                ("REMUX", 95.0),
                ("BRRip", 85.0),
                ("WEB-DL", 80.0),
                ("WEBRip", 75.0),
                ("HDTV", 60.0),
                ("DVDRip", 50.0),
                ("DVD", 45.0),
                ("SCR", 25.0),
                ("TC", 20.0),
                ("TS", 15.0),
                ("CAM", 10.0),
            ]),
            codec: table(&[("AV1", 12.0), ("HEVC", 10.0), ("x264", 8.0), ("XviD", 5.0)]),
            audio: table(&[
                ("Atmos", 15.0),
                ("TrueHD", 12.0),
                ("DTS-HD", 10.0),
                ("DTS", 8.0),
                ("DD+", 6.0),
                ("DD5.1", 6.0),
                ("AAC", 4.0),
                ("MP3", 2.0),
            ]),
            hdr: table(&[("DV", 15.0), ("HDR10+", 12.0), ("HDR10", 10.0), ("HDR", 8.0)]),
            trusted_groups: [
                "SPARKS", "RARBG", "YTS", "YIFY", "ETRG", "PSA", "FGT", "MeGusta", "ROVERS",
                "TGx", "GalaxyRG", "UTR", "EVO", "CMRG", "NTb", "DEFLATE", "FLUX",
            ]
            .iter()
            .map(|g| g.to_string())
            .collect(),
            trusted_group_bonus: 10.0,
            repack_proper_bonus: 5.0,
            seeder_weight: 5.0,
            size_bonus: 5.0,
            size_bonus_min_gib: 2.0,
            size_bonus_max_gib: 15.0,
            oversize_penalty: -10.0,
            oversize_threshold_gib: 50.0,
        }
    }
}

/// Per-component scores. `total_score` is the sum of every other field.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub quality_score: f64,
    pub source_score: f64,
    pub codec_score: f64,
    pub audio_score: f64,
    pub hdr_score: f64,
    pub group_score: f64,
    pub seeder_score: f64,
    pub size_score: f64,
    pub total_score: f64,
}

fn lookup(map: &BTreeMap<String, f64>, key: Option<&str>) -> f64 {
    key.and_then(|k| map.get(k)).copied().unwrap_or(0.0)
}

impl ScoreTable {
    /// Score already-parsed attributes.
    pub fn score_parsed(
        &self,
        parsed: &ParsedRelease,
        size_bytes: Option<u64>,
        seeders: Option<u32>,
    ) -> ScoreBreakdown {
        let quality_score = match parsed.resolution {
            Some(r) => lookup(&self.resolution, Some(r.as_str())),
            None => self.unknown_resolution,
        };
        let source_score = lookup(&self.source, parsed.source.map(|s| s.as_str()));
        let codec_score = lookup(&self.codec, parsed.codec.map(|c| c.as_str()));
        let audio_score = lookup(&self.audio, parsed.audio.map(|a| a.as_str()));
        let hdr_score = parsed
            .hdr
            .iter()
            .map(|h| lookup(&self.hdr, Some(h.as_str())))
            .sum();

        let mut group_score = 0.0;
        if let Some(group) = &parsed.group {
            if self
                .trusted_groups
                .iter()
                .any(|g| g.eq_ignore_ascii_case(group))
            {
                group_score += self.trusted_group_bonus;
            }
        }
        if parsed.repack || parsed.proper {
            group_score += self.repack_proper_bonus;
        }

        let seeder_score = match seeders {
            Some(s) if s > 0 => (f64::from(s) + 1.0).log10() * self.seeder_weight,
            _ => 0.0,
        };

        let size_score = match size_bytes {
            Some(bytes) if bytes > 0 => {
                let gib = bytes as f64 / GIB;
                if gib > self.oversize_threshold_gib {
                    self.oversize_penalty
                } else if gib >= self.size_bonus_min_gib && gib <= self.size_bonus_max_gib {
                    self.size_bonus
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        let total_score = quality_score
            + source_score
            + codec_score
            + audio_score
            + hdr_score
            + group_score
            + seeder_score
            + size_score;

        ScoreBreakdown {
            quality_score,
            source_score,
            codec_score,
            audio_score,
            hdr_score,
            group_score,
            seeder_score,
            size_score,
            total_score,
        }
    }

    /// Parse and score a release. Pure and deterministic.
    pub fn score(&self, name: &str, size_bytes: Option<u64>, seeders: Option<u32>) -> ScoreBreakdown {
        self.score_parsed(&parse_release(name), size_bytes, seeders)
    }
}

/// Score with the built-in table.
pub fn score(name: &str, size_bytes: Option<u64>, seeders: Option<u32>) -> ScoreBreakdown {
    ScoreTable::default().score(name, size_bytes, seeders)
}

/// Coarse quality bucket used for per-tier caps and statistics.
pub fn quality_tier(parsed: &ParsedRelease) -> String {
    if let Some(source) = parsed.source.filter(|s| s.is_cam_family()) {
        return source.as_str().to_string();
    }
    match parsed.resolution {
        Some(Resolution::R2160p) => "4K",
        Some(Resolution::R1440p) => "1440p",
        Some(Resolution::R1080p) => "1080p",
        Some(Resolution::R720p) => "720p",
        Some(Resolution::R576p) | Some(Resolution::R480p) => "480p",
        Some(Resolution::R360p) | None => "SD",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_pure() {
        let name = "Movie.2020.1080p.BluRay.x264.DTS-SPARKS";
        let a = score(name, Some(8 * 1024 * 1024 * 1024), Some(120));
        for _ in 0..10 {
            assert_eq!(score(name, Some(8 * 1024 * 1024 * 1024), Some(120)), a);
        }
    }

    #[test]
    fn test_score_components() {
        let s = score("Movie.2020.1080p.BluRay.x264.DTS-SPARKS", None, None);
        assert_eq!(s.quality_score, 80.0);
        assert_eq!(s.source_score, 100.0);
        assert_eq!(s.codec_score, 8.0);
        assert_eq!(s.audio_score, 8.0);
        assert_eq!(s.group_score, 10.0);
        assert_eq!(s.seeder_score, 0.0);
        assert_eq!(s.size_score, 0.0);
        assert_eq!(s.total_score, 206.0);
    }

    #[test]
    fn test_group_is_case_insensitive_and_repack_adds() {
        let s = score("Movie.2020.720p.WEB-DL.REPACK-megusta", None, None);
        assert_eq!(s.group_score, 15.0);
    }

    #[test]
    fn test_seeder_bonus_is_logarithmic() {
        let s = score("x", None, Some(99));
        assert!((s.seeder_score - 10.0).abs() < 1e-9);
        assert_eq!(score("x", None, Some(0)).seeder_score, 0.0);
        assert_eq!(score("x", None, None).seeder_score, 0.0);
    }

    #[test]
    fn test_size_shape() {
        let gib = 1024 * 1024 * 1024;
        assert_eq!(score("x", Some(gib), None).size_score, 0.0);
        assert_eq!(score("x", Some(2 * gib), None).size_score, 5.0);
        assert_eq!(score("x", Some(15 * gib), None).size_score, 5.0);
        assert_eq!(score("x", Some(30 * gib), None).size_score, 0.0);
        assert_eq!(score("x", Some(51 * gib), None).size_score, -10.0);
    }

    #[test]
    fn test_hdr_stacks_dolby_vision() {
        let s = score("M.2160p.WEB-DL.DV.HDR10+.HEVC", None, None);
        assert_eq!(s.hdr_score, 27.0);
    }

    #[test]
    fn test_custom_table_changes_weights() {
        let mut table = ScoreTable::default();
        table.resolution.insert("720p".to_string(), 500.0);
        let custom = table.score("M.720p.HDTV", None, None);
        let default = score("M.720p.HDTV", None, None);
        assert_eq!(custom.quality_score, 500.0);
        assert!(custom.total_score > default.total_score);
    }

    #[test]
    fn test_score_table_partial_override_keeps_defaults() {
        let table: ScoreTable = toml::from_str("trusted_group_bonus = 20.0").unwrap();
        assert_eq!(table.trusted_group_bonus, 20.0);
        assert_eq!(table.resolution.get("1080p"), Some(&80.0));
    }

    #[test]
    fn test_quality_tier() {
        let tier = |n: &str| quality_tier(&parse_release(n));
        assert_eq!(tier("M.2160p.WEB-DL"), "4K");
        assert_eq!(tier("M.1080p.BluRay"), "1080p");
        assert_eq!(tier("M.720p.HDTV"), "720p");
        assert_eq!(tier("M.576p.DVDRip"), "480p");
        assert_eq!(tier("M.DVDRip"), "SD");
        assert_eq!(tier("M.2024.1080p.HDCAM"), "CAM");
        assert_eq!(tier("M.2024.TS"), "TS");
    }
}
