//! Magnet link and info-hash helpers.
//!
//! Info hashes are always canonicalised to 40 lowercase hex characters before
//! being used as dedup or cache-availability keys. BitTorrent also allows the
//! 32-character base32 form in magnet links; it is decoded to the same hex.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static BTIH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)xt=urn:btih:([a-z0-9]+)").expect("valid btih regex"));

static TR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[?&]tr=([^&]+)").expect("valid tr regex"));

static DN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[?&]dn=").expect("valid dn regex"));

/// Normalise a raw info hash (hex or base32) to lowercase 40-hex.
pub fn normalize_info_hash(raw: &str) -> Option<String> {
    let raw = raw.trim();
    match raw.len() {
        40 if raw.chars().all(|c| c.is_ascii_hexdigit()) => Some(raw.to_ascii_lowercase()),
        32 => decode_base32(raw).map(|bytes| to_hex(&bytes)),
        _ => None,
    }
}

/// Extract the canonical info hash from a magnet URI.
pub fn info_hash_from_magnet(uri: &str) -> Option<String> {
    if !uri.starts_with("magnet:") {
        return None;
    }
    BTIH_RE
        .captures(uri)
        .and_then(|caps| caps.get(1))
        .and_then(|m| normalize_info_hash(m.as_str()))
}

/// Announce URLs carried by a magnet's `tr=` parameters, decoded, in order.
pub fn announce_urls(uri: &str) -> Vec<String> {
    if !uri.starts_with("magnet:") {
        return Vec::new();
    }
    let mut urls: Vec<String> = Vec::new();
    for caps in TR_RE.captures_iter(uri) {
        let Some(raw) = caps.get(1) else { continue };
        let url = urlencoding::decode(raw.as_str())
            .map(|u| u.into_owned())
            .unwrap_or_else(|_| raw.as_str().to_string());
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Build a magnet URI for a hash, with one `tr=` per announce URL.
pub fn build_magnet(info_hash: &str, name: &str, trackers: &[String]) -> String {
    let mut magnet = format!(
        "magnet:?xt=urn:btih:{}&dn={}",
        info_hash,
        urlencoding::encode(name)
    );
    for tracker in trackers {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    magnet
}

/// Extend an existing magnet in place of rebuilding it.
///
/// Everything the adapter supplied is kept. A `dn` is added when missing and
/// every announce URL the magnet does not already carry is appended.
pub fn enrich_magnet(uri: &str, name: &str, trackers: &[String]) -> String {
    let present = announce_urls(uri);
    let mut magnet = uri.to_string();
    if !DN_RE.is_match(uri) {
        magnet.push_str("&dn=");
        magnet.push_str(&urlencoding::encode(name));
    }
    for tracker in trackers.iter().filter(|t| !present.contains(t)) {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    magnet
}

/// RFC 4648 base32 decoding of a 20-byte hash (no padding).
fn decode_base32(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(20);
    let mut buffer: u64 = 0;
    let mut bits = 0u32;

    for c in input.bytes() {
        let value = match c.to_ascii_uppercase() {
            b @ b'A'..=b'Z' => b - b'A',
            b @ b'2'..=b'7' => b - b'2' + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | u64::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }

    (out.len() == 20).then_some(out)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
