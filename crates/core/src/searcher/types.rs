//! Types for the multi-source search system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::magnet::{info_hash_from_magnet, normalize_info_hash};

/// Content category a search is restricted to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Movie,
    Show,
}

/// Per-request endpoint/credential override for one adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdapterEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Query parameters for a fan-out search. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text search query.
    pub query: String,
    /// Optional: limit to specific categories. Empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<MediaCategory>,
    /// Optional per-adapter endpoint overrides, keyed by adapter name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub endpoints: HashMap<String, AdapterEndpoint>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            categories: Vec::new(),
            endpoints: HashMap::new(),
        }
    }

    pub fn with_category(mut self, category: MediaCategory) -> Self {
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    /// Whether the query wants results of this category.
    pub fn wants(&self, category: MediaCategory) -> bool {
        self.categories.is_empty() || self.categories.contains(&category)
    }

    /// Endpoint override for an adapter, if the caller supplied one.
    pub fn endpoint(&self, adapter: &str) -> Option<&AdapterEndpoint> {
        self.endpoints.get(adapter)
    }
}

/// Raw result from a single adapter (before deduplication).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawResult {
    /// Release name as reported by the site.
    pub name: String,
    /// Adapter that produced this result.
    pub tracker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<u32>,
    /// Magnet link or .torrent metadata URL.
    pub download_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
}

impl RawResult {
    /// Canonical lowercase 40-hex info hash.
    ///
    /// Uses the adapter-supplied hash when it is valid, otherwise derives it
    /// from the magnet link.
    pub fn canonical_info_hash(&self) -> Option<String> {
        self.info_hash
            .as_deref()
            .and_then(normalize_info_hash)
            .or_else(|| info_hash_from_magnet(&self.download_uri))
    }

    pub fn is_magnet(&self) -> bool {
        self.download_uri.starts_with("magnet:")
    }

    pub fn seeders_or_zero(&self) -> u32 {
        self.seeders.unwrap_or(0)
    }
}

/// Errors a single adapter can report. Always isolated per adapter.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Adapter timed out")]
    Timeout,

    #[error("Adapter not configured: {0}")]
    NotConfigured(String),

    #[error("Adapter task aborted: {0}")]
    Aborted(String),
}

impl AdapterError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AdapterError::Timeout
        } else if e.is_connect() {
            AdapterError::ConnectionFailed(e.to_string())
        } else if let Some(status) = e.status() {
            AdapterError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            AdapterError::Parse(e.to_string())
        }
    }
}

/// Contract every indexer/site adapter implements.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Adapter name, used as the registry and health key.
    fn name(&self) -> &str;

    /// Search this source. An empty list is a successful outcome.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawResult>, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(download_uri: &str, info_hash: Option<&str>) -> RawResult {
        RawResult {
            name: "Some.Movie.2020.1080p.WEB-DL".to_string(),
            tracker: "test".to_string(),
            category: None,
            size_bytes: None,
            seeders: None,
            peers: None,
            download_uri: download_uri.to_string(),
            info_hash: info_hash.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_canonical_hash_prefers_valid_field() {
        let r = raw(
            "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            Some("BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"),
        );
        assert_eq!(
            r.canonical_info_hash().as_deref(),
            Some("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
        );
    }

    #[test]
    fn test_canonical_hash_falls_back_to_magnet() {
        let r = raw(
            "magnet:?xt=urn:btih:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA&dn=x",
            Some("not-a-hash"),
        );
        assert_eq!(
            r.canonical_info_hash().as_deref(),
            Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
    }

    #[test]
    fn test_canonical_hash_absent_for_torrent_url() {
        let r = raw("https://example.org/file.torrent", None);
        assert!(r.canonical_info_hash().is_none());
        assert!(!r.is_magnet());
    }

    #[test]
    fn test_search_query_wants() {
        let q = SearchQuery::new("test");
        assert!(q.wants(MediaCategory::Movie));
        assert!(q.wants(MediaCategory::Show));

        let q = q.with_category(MediaCategory::Show);
        assert!(!q.wants(MediaCategory::Movie));
        assert!(q.wants(MediaCategory::Show));
    }

    #[test]
    fn test_search_query_serialization() {
        let json = r#"{"query": "minimal"}"#;
        let parsed: SearchQuery = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.query, "minimal");
        assert!(parsed.categories.is_empty());
        assert!(parsed.endpoints.is_empty());

        let out = serde_json::to_string(&parsed).unwrap();
        assert!(!out.contains("categories"));
        assert!(!out.contains("endpoints"));
    }

    #[test]
    fn test_media_category_serialization() {
        assert_eq!(
            serde_json::to_string(&MediaCategory::Movie).unwrap(),
            "\"movie\""
        );
        assert_eq!(
            serde_json::to_string(&MediaCategory::Show).unwrap(),
            "\"show\""
        );
    }
}
