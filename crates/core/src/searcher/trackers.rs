//! Announce lists appended to output magnets.
//!
//! Adapters often return magnets with few or no `tr=` parameters, which leaves
//! clients relying on DHT alone. Every emitted magnet carries the announce
//! URLs collected from all merged duplicates plus a configured list chosen by
//! the kind of site that reported the release.

use serde::{Deserialize, Serialize};

/// Which configured list applies to a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerFamily {
    General,
    Anime,
    Russian,
}

impl TrackerFamily {
    /// Classify by adapter label. Labels like `jackett|nyaasi` match on any
    /// `|`-separated segment.
    pub fn for_label(label: &str, lists: &TrackerLists) -> Self {
        let matches = |sites: &[String]| {
            label
                .split('|')
                .map(str::trim)
                .any(|segment| sites.iter().any(|s| s.eq_ignore_ascii_case(segment)))
        };
        if matches(&lists.anime_sites) {
            TrackerFamily::Anime
        } else if matches(&lists.russian_sites) {
            TrackerFamily::Russian
        } else {
            TrackerFamily::General
        }
    }
}

/// Configured announce URLs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrackerLists {
    /// Set to false to emit only the announce URLs the adapters reported.
    #[serde(default = "default_enhance")]
    pub enhance: bool,
    #[serde(default = "default_best")]
    pub best: Vec<String>,
    #[serde(default = "default_general")]
    pub general: Vec<String>,
    #[serde(default = "default_anime")]
    pub anime: Vec<String>,
    #[serde(default = "default_russian")]
    pub russian: Vec<String>,
    /// Adapter labels treated as anime sites.
    #[serde(default = "default_anime_sites")]
    pub anime_sites: Vec<String>,
    /// Adapter labels treated as Russian sites.
    #[serde(default = "default_russian_sites")]
    pub russian_sites: Vec<String>,
}

impl Default for TrackerLists {
    fn default() -> Self {
        Self {
            enhance: default_enhance(),
            best: default_best(),
            general: default_general(),
            anime: default_anime(),
            russian: default_russian(),
            anime_sites: default_anime_sites(),
            russian_sites: default_russian_sites(),
        }
    }
}

impl TrackerLists {
    /// Announce URLs for a family: the best list first, then the
    /// family-specific extras, without repeats.
    pub fn for_family(&self, family: TrackerFamily) -> Vec<String> {
        if !self.enhance {
            return Vec::new();
        }
        let extra = match family {
            TrackerFamily::General => &self.general,
            TrackerFamily::Anime => &self.anime,
            TrackerFamily::Russian => &self.russian,
        };
        let mut urls: Vec<String> = Vec::with_capacity(self.best.len() + extra.len());
        for url in self.best.iter().chain(extra.iter()) {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }

    /// Merge reported announce URLs with the configured list for `label`.
    /// Reported URLs keep their order and come first.
    pub fn merge(&self, reported: &[String], label: &str) -> Vec<String> {
        let mut urls = reported.to_vec();
        for url in self.for_family(TrackerFamily::for_label(label, self)) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        urls
    }
}

fn default_enhance() -> bool {
    true
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_best() -> Vec<String> {
    strings(&[
        "udp://tracker.opentrackr.org:1337/announce",
        "udp://open.stealth.si:80/announce",
        "udp://tracker.torrent.eu.org:451/announce",
    ])
}

fn default_general() -> Vec<String> {
    strings(&[
        "udp://tracker.torrent.eu.org:451/announce",
        "udp://tracker.tiny-vps.com:6969/announce",
        "udp://open.demonii.com:1337/announce",
    ])
}

fn default_anime() -> Vec<String> {
    strings(&[
        "http://nyaa.tracker.wf:7777/announce",
        "http://anidex.moe:6969/announce",
        "http://tracker.anirena.com:80/announce",
        "udp://tracker.uw0.xyz:6969/announce",
        "http://share.camoe.cn:8080/announce",
        "http://t.nyaatracker.com:80/announce",
    ])
}

fn default_russian() -> Vec<String> {
    strings(&[
        "udp://opentor.net:6969",
        "http://bt.t-ru.org/ann?magnet",
        "http://bt2.t-ru.org/ann?magnet",
        "http://bt3.t-ru.org/ann?magnet",
        "http://bt4.t-ru.org/ann?magnet",
        "http://retracker.local/announce",
    ])
}

fn default_anime_sites() -> Vec<String> {
    strings(&[
        "nyaasi",
        "tokyotosho",
        "anidex",
        "horriblesubs",
        "subsplease",
        "anilibria",
        "erai",
    ])
}

fn default_russian_sites() -> Vec<String> {
    strings(&["rutor", "rutracker", "anilibria"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_classification() {
        let lists = TrackerLists::default();
        assert_eq!(TrackerFamily::for_label("jackett|nyaasi", &lists), TrackerFamily::Anime);
        assert_eq!(TrackerFamily::for_label("RuTracker", &lists), TrackerFamily::Russian);
        // Anime wins for sites in both lists
        assert_eq!(TrackerFamily::for_label("anilibria", &lists), TrackerFamily::Anime);
        assert_eq!(TrackerFamily::for_label("jackett|1337x", &lists), TrackerFamily::General);
    }

    #[test]
    fn test_family_list_has_no_repeats() {
        let lists = TrackerLists::default();
        let general = lists.for_family(TrackerFamily::General);
        // "tracker.torrent.eu.org" is in both best and general
        assert_eq!(general.len(), lists.best.len() + lists.general.len() - 1);
        assert_eq!(general[0], lists.best[0]);
    }

    #[test]
    fn test_merge_keeps_reported_first() {
        let lists = TrackerLists {
            best: vec!["udp://best.example:1".into()],
            general: vec!["udp://reported.example:1".into()],
            ..Default::default()
        };
        let merged = lists.merge(&["udp://reported.example:1".to_string()], "idx");
        assert_eq!(merged, vec!["udp://reported.example:1", "udp://best.example:1"]);
    }

    #[test]
    fn test_disabled_enhancement_keeps_reported_only() {
        let lists = TrackerLists {
            enhance: false,
            ..Default::default()
        };
        let reported = vec!["udp://a.example:1".to_string()];
        assert_eq!(lists.merge(&reported, "nyaasi"), reported);
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let lists: TrackerLists = toml::from_str("best = [\"udp://mine.example:1\"]").unwrap();
        assert_eq!(lists.best, vec!["udp://mine.example:1"]);
        assert_eq!(lists.anime, default_anime());
        assert!(lists.enhance);
    }
}
