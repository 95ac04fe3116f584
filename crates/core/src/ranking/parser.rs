//! Release-name parsing.
//!
//! Extracts quality attributes from scene-style release names such as
//! `Movie.Title.2020.2160p.UHD.BluRay.REMUX.HDR.DV.TrueHD.Atmos.7.1-GROUP`.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    #[serde(rename = "2160p")]
    R2160p,
    #[serde(rename = "1440p")]
    R1440p,
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "576p")]
    R576p,
    #[serde(rename = "480p")]
    R480p,
    #[serde(rename = "360p")]
    R360p,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::R2160p => "2160p",
            Resolution::R1440p => "1440p",
            Resolution::R1080p => "1080p",
            Resolution::R720p => "720p",
            Resolution::R576p => "576p",
            Resolution::R480p => "480p",
            Resolution::R360p => "360p",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    #[serde(rename = "REMUX")]
    Remux,
    #[serde(rename = "BluRay")]
    BluRay,
    #[serde(rename = "BRRip")]
    BrRip,
    #[serde(rename = "WEB-DL")]
    WebDl,
    #[serde(rename = "WEBRip")]
    WebRip,
    #[serde(rename = "HDTV")]
    Hdtv,
    #[serde(rename = "DVDRip")]
    DvdRip,
    #[serde(rename = "DVD")]
    Dvd,
    #[serde(rename = "SCR")]
    Scr,
    #[serde(rename = "TC")]
    Tc,
    #[serde(rename = "TS")]
    Ts,
    #[serde(rename = "CAM")]
    Cam,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Remux => "REMUX",
            Source::BluRay => "BluRay",
            Source::BrRip => "BRRip",
            Source::WebDl => "WEB-DL",
            Source::WebRip => "WEBRip",
            Source::Hdtv => "HDTV",
            Source::DvdRip => "DVDRip",
            Source::Dvd => "DVD",
            Source::Scr => "SCR",
            Source::Tc => "TC",
            Source::Ts => "TS",
            Source::Cam => "CAM",
        }
    }

    /// Theatrical captures (camera, telesync, telecine, screener).
    pub fn is_cam_family(&self) -> bool {
        matches!(self, Source::Cam | Source::Ts | Source::Tc | Source::Scr)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Codec {
    #[serde(rename = "AV1")]
    Av1,
    #[serde(rename = "HEVC")]
    Hevc,
    #[serde(rename = "x264")]
    X264,
    #[serde(rename = "XviD")]
    Xvid,
}

impl Codec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Av1 => "AV1",
            Codec::Hevc => "HEVC",
            Codec::X264 => "x264",
            Codec::Xvid => "XviD",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Audio {
    #[serde(rename = "Atmos")]
    Atmos,
    #[serde(rename = "TrueHD")]
    TrueHd,
    #[serde(rename = "DTS-HD")]
    DtsHd,
    #[serde(rename = "DTS")]
    Dts,
    #[serde(rename = "DD+")]
    DdPlus,
    #[serde(rename = "DD5.1")]
    Dd51,
    #[serde(rename = "AAC")]
    Aac,
    #[serde(rename = "MP3")]
    Mp3,
}

impl Audio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audio::Atmos => "Atmos",
            Audio::TrueHd => "TrueHD",
            Audio::DtsHd => "DTS-HD",
            Audio::Dts => "DTS",
            Audio::DdPlus => "DD+",
            Audio::Dd51 => "DD5.1",
            Audio::Aac => "AAC",
            Audio::Mp3 => "MP3",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hdr {
    #[serde(rename = "DV")]
    DolbyVision,
    #[serde(rename = "HDR10+")]
    Hdr10Plus,
    #[serde(rename = "HDR10")]
    Hdr10,
    #[serde(rename = "HDR")]
    Hdr,
}

impl Hdr {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hdr::DolbyVision => "DV",
            Hdr::Hdr10Plus => "HDR10+",
            Hdr::Hdr10 => "HDR10",
            Hdr::Hdr => "HDR",
        }
    }
}

/// Season/episode markers found in a release name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpisodeInfo {
    /// Every season the release covers (a range expands to all of them).
    pub seasons: Vec<u32>,
    /// Explicit episodes; empty for season packs.
    pub episodes: Vec<u32>,
}

impl EpisodeInfo {
    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty() && self.episodes.is_empty()
    }

    pub fn is_season_pack(&self) -> bool {
        !self.seasons.is_empty() && self.episodes.is_empty()
    }
}

/// Attributes parsed from a release name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedRelease {
    pub resolution: Option<Resolution>,
    pub source: Option<Source>,
    pub codec: Option<Codec>,
    pub audio: Option<Audio>,
    /// Every HDR format present, best first.
    pub hdr: Vec<Hdr>,
    pub is_3d: bool,
    pub group: Option<String>,
    pub repack: bool,
    pub proper: bool,
    pub episode: EpisodeInfo,
}

impl ParsedRelease {
    pub fn has_hdr(&self) -> bool {
        !self.hdr.is_empty()
    }

    pub fn has_dolby_vision(&self) -> bool {
        self.hdr.contains(&Hdr::DolbyVision)
    }

    pub fn is_4k(&self) -> bool {
        self.resolution == Some(Resolution::R2160p)
    }

    pub fn is_remux(&self) -> bool {
        self.source == Some(Source::Remux)
    }

    pub fn is_cam(&self) -> bool {
        self.source.map(|s| s.is_cam_family()).unwrap_or(false)
    }
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

// Checked top to bottom; the first match wins.
static RESOLUTIONS: Lazy<Vec<(Resolution, Regex)>> = Lazy::new(|| {
    vec![
        (Resolution::R2160p, re(r"(?i)\b(2160p|4k|uhd)\b")),
        (Resolution::R1440p, re(r"(?i)\b1440p\b")),
        (Resolution::R1080p, re(r"(?i)\b1080[pi]\b")),
        (Resolution::R720p, re(r"(?i)\b720p\b")),
        (Resolution::R576p, re(r"(?i)\b576p\b")),
        (Resolution::R480p, re(r"(?i)\b480p\b")),
        (Resolution::R360p, re(r"(?i)\b360p\b")),
    ]
});

static SOURCES: Lazy<Vec<(Source, Regex)>> = Lazy::new(|| {
    vec![
        (Source::Remux, re(r"(?i)\b(remux|bdremux)\b")),
        (Source::BrRip, re(r"(?i)\b(brrip|bdrip|blu-?ray-?rip)\b")),
        (Source::BluRay, re(r"(?i)\b(blu-?ray|bd25|bd50|bdmv)\b")),
        (Source::WebRip, re(r"(?i)\bweb[-. ]?rip\b")),
        (Source::WebDl, re(r"(?i)\b(web[-. ]?dl|web)\b")),
        (Source::Hdtv, re(r"(?i)\b(hdtv|pdtv|hdtvrip)\b")),
        (Source::DvdRip, re(r"(?i)\bdvd-?rip\b")),
        (Source::Scr, re(r"(?i)\b(scr|screener|dvdscr)\b")),
        (Source::Dvd, re(r"(?i)\bdvd(r|5|9)?\b")),
        (Source::Tc, re(r"(?i)\b(tc|hdtc|telecine)\b")),
        (Source::Ts, re(r"(?i)\b(ts|hdts|telesync)\b")),
        (Source::Cam, re(r"(?i)\b(cam|camrip|hdcam)\b")),
    ]
});

static CODECS: Lazy<Vec<(Codec, Regex)>> = Lazy::new(|| {
    vec![
        (Codec::Av1, re(r"(?i)\bav1\b")),
        (Codec::Hevc, re(r"(?i)\b(hevc|x265|h\.?265)\b")),
        (Codec::X264, re(r"(?i)\b(x264|h\.?264|avc)\b")),
        (Codec::Xvid, re(r"(?i)\b(xvid|divx)\b")),
    ]
});

static AUDIO: Lazy<Vec<(Audio, Regex)>> = Lazy::new(|| {
    vec![
        (Audio::Atmos, re(r"(?i)\batmos\b")),
        (Audio::TrueHd, re(r"(?i)\btrue-?hd\b")),
        (Audio::DtsHd, re(r"(?i)\bdts[-. ]?(hd|x)\b|\bdts[-. ]?hd[-. ]?ma\b")),
        (Audio::Dts, re(r"(?i)\bdts\b")),
        (Audio::DdPlus, re(r"(?i)\b(ddp|dd\+|e-?ac-?3)")),
        (Audio::Dd51, re(r"(?i)\b(dd5[. ]?1|ac-?3|dolby[. ]digital)\b")),
        (Audio::Aac, re(r"(?i)\baac")),
        (Audio::Mp3, re(r"(?i)\bmp3\b")),
    ]
});

static HDR: Lazy<Vec<(Hdr, Regex)>> = Lazy::new(|| {
    vec![
        (Hdr::DolbyVision, re(r"(?i)\b(dv|dovi|dolby[. ]?vision)\b")),
        (Hdr::Hdr10Plus, re(r"(?i)\bhdr10(\+|plus)")),
        (Hdr::Hdr10, re(r"(?i)\bhdr10\b")),
        (Hdr::Hdr, re(r"(?i)\bhdr\b")),
    ]
});

static THREE_D: Lazy<Regex> = Lazy::new(|| re(r"(?i)\b(3d|h-?sbs|h-?ou|half-?sbs)\b"));
static REPACK: Lazy<Regex> = Lazy::new(|| re(r"(?i)\b(repack|rerip)\b"));
static PROPER: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bproper\b"));
static EXTENSION: Lazy<Regex> = Lazy::new(|| re(r"(?i)\.(mkv|mp4|avi|mov|wmv|m4v|ts)$"));
static GROUP_SUFFIX: Lazy<Regex> = Lazy::new(|| re(r"-([A-Za-z0-9]+)$"));
static GROUP_BRACKET: Lazy<Regex> = Lazy::new(|| re(r"\[([A-Za-z0-9 ._-]+)\]$"));
static GROUP_LEADING: Lazy<Regex> = Lazy::new(|| re(r"^\[([A-Za-z0-9 ._-]+)\]"));

static SEASON_RANGE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bs(\d{1,2})\s?-\s?s?(\d{1,2})\b"));
static SEASON_EPISODE: Lazy<Regex> =
    Lazy::new(|| re(r"(?i)\bs(\d{1,2})[. ]?e(\d{1,3})(?:-?e(\d{1,3}))?"));
static CROSS_EPISODE: Lazy<Regex> = Lazy::new(|| re(r"(?i)\b(\d{1,2})x(\d{1,3})\b"));
static SEASON_ONLY: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bs(\d{1,2})\b"));
static SEASON_WORD: Lazy<Regex> = Lazy::new(|| re(r"(?i)\bseason[. ]?(\d{1,2})\b"));

fn first_match<T: Copy>(table: &[(T, Regex)], text: &str) -> Option<T> {
    table
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(value, _)| *value)
}

/// Parse a release name. Pure: equal input always yields equal output.
pub fn parse_release(name: &str) -> ParsedRelease {
    // Underscores are word characters for `\b`; treat them as separators.
    let text = name.replace('_', " ");

    let hdr: Vec<Hdr> = HDR
        .iter()
        .filter(|(_, pattern)| pattern.is_match(&text))
        .map(|(value, _)| *value)
        .collect();
    // Dolby Vision stacks with one HDR10-family marker, the most specific.
    let hdr10_family = [Hdr::Hdr10Plus, Hdr::Hdr10, Hdr::Hdr]
        .into_iter()
        .find(|h| hdr.contains(h));
    let hdr: Vec<Hdr> = hdr
        .iter()
        .copied()
        .filter(|h| *h == Hdr::DolbyVision || Some(*h) == hdr10_family)
        .collect();

    ParsedRelease {
        resolution: first_match(&RESOLUTIONS, &text),
        source: first_match(&SOURCES, &text),
        codec: first_match(&CODECS, &text),
        audio: first_match(&AUDIO, &text),
        hdr,
        is_3d: THREE_D.is_match(&text),
        group: parse_group(name),
        repack: REPACK.is_match(&text),
        proper: PROPER.is_match(&text),
        episode: parse_episode(&text),
    }
}

fn parse_group(name: &str) -> Option<String> {
    let trimmed = EXTENSION.replace(name.trim(), "");
    let trimmed = trimmed.trim();

    [&*GROUP_SUFFIX, &*GROUP_BRACKET, &*GROUP_LEADING]
        .iter()
        .filter_map(|pattern| pattern.captures(trimmed))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .find(|g| is_plausible_group(g))
}

fn is_plausible_group(candidate: &str) -> bool {
    !candidate.is_empty()
        && !candidate.chars().all(|c| c.is_ascii_digit())
        && first_match(&RESOLUTIONS, candidate).is_none()
}

fn parse_episode(text: &str) -> EpisodeInfo {
    let mut info = EpisodeInfo::default();

    if let Some(caps) = SEASON_RANGE.captures(text) {
        let from = caps[1].parse::<u32>().unwrap_or(0);
        let to = caps[2].parse::<u32>().unwrap_or(0);
        if from <= to && to - from < 50 {
            info.seasons = (from..=to).collect();
            return info;
        }
    }

    if let Some(caps) = SEASON_EPISODE.captures(text) {
        let season = caps[1].parse::<u32>().unwrap_or(0);
        let first = caps[2].parse::<u32>().unwrap_or(0);
        let last = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(first);
        info.seasons.push(season);
        info.episodes = if first <= last && last - first < 100 {
            (first..=last).collect()
        } else {
            vec![first]
        };
        return info;
    }

    if let Some(caps) = CROSS_EPISODE.captures(text) {
        // 1x02 style; avoid matching resolutions like 1920x1080
        let season = caps[1].parse::<u32>().unwrap_or(0);
        let episode = caps[2].parse::<u32>().unwrap_or(0);
        info.seasons.push(season);
        info.episodes.push(episode);
        return info;
    }

    if let Some(caps) = SEASON_ONLY
        .captures(text)
        .or_else(|| SEASON_WORD.captures(text))
    {
        if let Ok(season) = caps[1].parse::<u32>() {
            info.seasons.push(season);
        }
    }

    info
}
