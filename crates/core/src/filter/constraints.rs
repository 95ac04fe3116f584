//! User constraints applied by the filter pipeline.

use serde::{Deserialize, Serialize};

use crate::ranking::Resolution;

fn default_blocked_categories() -> Vec<String> {
    vec!["DVD".to_string()]
}

fn default_adult_keywords() -> Vec<String> {
    ["xxx", "porn", "adult", "erotic", "18+", "hentai"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Validated constraint bundle. Missing fields take their defaults, so a
/// request can name only the toggles it cares about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConstraints {
    /// Results with fewer seeders are dropped. Unknown seeders count as 0.
    pub min_seeders: u32,
    /// Category substrings (case-insensitive) that reject a result.
    pub blocked_categories: Vec<String>,
    /// Drop results whose name or category contains an adult keyword.
    pub remove_adult: bool,
    pub adult_keywords: Vec<String>,
    /// Drop HEVC/x265/H.265 encodes.
    pub block_hevc: bool,
    pub disable_4k: bool,
    pub disable_cam: bool,
    pub disable_hdr: bool,
    pub disable_dolby_vision: bool,
    pub disable_3d: bool,
    pub disable_remux: bool,
    /// Resolutions rejected outright.
    pub blocked_resolutions: Vec<Resolution>,
}

impl Default for FilterConstraints {
    fn default() -> Self {
        Self {
            min_seeders: 0,
            blocked_categories: default_blocked_categories(),
            remove_adult: false,
            adult_keywords: default_adult_keywords(),
            block_hevc: false,
            disable_4k: false,
            disable_cam: false,
            disable_hdr: false,
            disable_dolby_vision: false,
            disable_3d: false,
            disable_remux: false,
            blocked_resolutions: Vec::new(),
        }
    }
}

/// Season and episode an episodic request is for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EpisodeTarget {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeTarget {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_takes_defaults() {
        let constraints: FilterConstraints = toml::from_str(
            r#"
            min_seeders = 5
            disable_cam = true
            blocked_resolutions = ["480p"]
            "#,
        )
        .unwrap();
        assert_eq!(constraints.min_seeders, 5);
        assert!(constraints.disable_cam);
        assert_eq!(constraints.blocked_resolutions, vec![Resolution::R480p]);
        assert_eq!(constraints.blocked_categories, vec!["DVD"]);
        assert_eq!(constraints.adult_keywords.len(), 6);
    }
}
