//! Torznab-style JSON search adapter (Jackett and Prowlarr).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::{AdapterConfig, AdapterKind};

use super::{AdapterError, MediaCategory, RawResult, SearchQuery, SourceAdapter};

/// Adapter for one Jackett or Prowlarr instance.
pub struct TorznabAdapter {
    name: String,
    kind: AdapterKind,
    url: String,
    api_key: String,
    client: Client,
}

impl TorznabAdapter {
    pub fn new(
        name: impl Into<String>,
        kind: AdapterKind,
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AdapterError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            kind,
            url: url.into(),
            api_key: api_key.into(),
            client,
        })
    }

    pub fn from_config(config: &AdapterConfig) -> Result<Self, AdapterError> {
        Self::new(
            config.name.clone(),
            config.kind,
            config.url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Base URL and key for a query, honouring per-request overrides.
    fn endpoint<'a>(&'a self, query: &'a SearchQuery) -> (&'a str, &'a str) {
        let overrides = query.endpoint(&self.name);
        let url = overrides
            .and_then(|e| e.url.as_deref())
            .unwrap_or(&self.url);
        let key = overrides
            .and_then(|e| e.api_key.as_deref())
            .unwrap_or(&self.api_key);
        (url.trim_end_matches('/'), key)
    }

    /// Build the search URL for this backend.
    fn build_search_url(&self, query: &SearchQuery) -> String {
        let (base, key) = self.endpoint(query);
        let categories = category_ids(query);

        match self.kind {
            AdapterKind::Jackett => {
                let mut url = format!(
                    "{}/api/v2.0/indexers/all/results?apikey={}&Query={}",
                    base,
                    urlencoding::encode(key),
                    urlencoding::encode(&query.query)
                );
                for id in categories {
                    url.push_str(&format!("&Category[]={}", id));
                }
                url
            }
            AdapterKind::Prowlarr => {
                let joined: Vec<String> = categories.iter().map(|c| c.to_string()).collect();
                format!(
                    "{}/api/v1/search?query={}&categories={}&type=search",
                    base,
                    urlencoding::encode(&query.query),
                    joined.join(",")
                )
            }
        }
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<reqwest::Response, AdapterError> {
        let url = self.build_search_url(query);
        let mut request = self.client.get(&url);
        if self.kind == AdapterKind::Prowlarr {
            let (_, key) = self.endpoint(query);
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await.map_err(AdapterError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }
        Ok(response)
    }

    fn tracker_label(&self, indexer: Option<&str>) -> String {
        match indexer.filter(|i| !i.is_empty()) {
            Some(indexer) => format!("{}|{}", self.name, indexer),
            None => self.name.clone(),
        }
    }
}

#[async_trait]
impl SourceAdapter for TorznabAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawResult>, AdapterError> {
        let (base, key) = self.endpoint(query);
        if base.is_empty() || key.is_empty() {
            return Err(AdapterError::NotConfigured(format!(
                "{} has no url or api key",
                self.name
            )));
        }

        debug!(adapter = %self.name, query = %query.query, "Searching Torznab backend");
        let response = self.fetch(query).await?;

        let results = match self.kind {
            AdapterKind::Jackett => {
                let body: JackettResponse = response
                    .json()
                    .await
                    .map_err(|e| AdapterError::Parse(e.to_string()))?;
                body.Results
                    .into_iter()
                    .filter_map(|r| self.convert_jackett(r))
                    .collect::<Vec<_>>()
            }
            AdapterKind::Prowlarr => {
                let body: Vec<ProwlarrResult> = response
                    .json()
                    .await
                    .map_err(|e| AdapterError::Parse(e.to_string()))?;
                body.into_iter()
                    .filter_map(|r| self.convert_prowlarr(r))
                    .collect::<Vec<_>>()
            }
        };

        debug!(adapter = %self.name, results = results.len(), "Torznab search complete");
        Ok(results)
    }
}

impl TorznabAdapter {
    fn convert_jackett(&self, r: JackettResult) -> Option<RawResult> {
        let download_uri = r.MagnetUri.or(r.Link).filter(|u| !u.is_empty())?;
        Some(RawResult {
            name: r.Title,
            tracker: self.tracker_label(r.Tracker.as_deref()),
            category: r.CategoryDesc,
            size_bytes: r.Size.and_then(|s| u64::try_from(s).ok()),
            seeders: r.Seeders.and_then(|s| u32::try_from(s).ok()),
            peers: r.Peers.and_then(|s| u32::try_from(s).ok()),
            download_uri,
            info_hash: r.InfoHash,
        })
    }

    fn convert_prowlarr(&self, r: ProwlarrResult) -> Option<RawResult> {
        let download_uri = r.magnetUrl.or(r.downloadUrl).filter(|u| !u.is_empty())?;
        Some(RawResult {
            name: r.title.unwrap_or_else(|| "Unknown".to_string()),
            tracker: self.tracker_label(r.indexer.as_deref()),
            category: r.categories.first().map(|c| category_name(c.id()).to_string()),
            size_bytes: r.size.and_then(|s| u64::try_from(s).ok()),
            seeders: r.seeders.and_then(|s| u32::try_from(s).ok()),
            peers: r.leechers.and_then(|s| u32::try_from(s).ok()),
            download_uri,
            info_hash: r.infoHash,
        })
    }
}

/// Newznab category ids for a query. An unrestricted query asks for both.
fn category_ids(query: &SearchQuery) -> Vec<u32> {
    let mut ids = Vec::new();
    if query.wants(MediaCategory::Movie) {
        ids.push(2000);
    }
    if query.wants(MediaCategory::Show) {
        ids.push(5000);
    }
    ids
}

fn category_name(id: i64) -> &'static str {
    match id {
        1000..=1999 => "Console",
        2000..=2999 => "Movies",
        3000..=3999 => "Audio",
        4000..=4999 => "PC",
        5000..=5999 => "TV",
        6000..=7999 => "XXX",
        8000..=8999 => "Other",
        _ => "Unknown",
    }
}

// Jackett API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResponse {
    Results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct JackettResult {
    Title: String,
    Tracker: Option<String>,
    MagnetUri: Option<String>,
    Link: Option<String>,
    InfoHash: Option<String>,
    Size: Option<i64>,
    Seeders: Option<i64>,
    Peers: Option<i64>,
    CategoryDesc: Option<String>,
}

// Prowlarr API response types
#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct ProwlarrResult {
    title: Option<String>,
    indexer: Option<String>,
    magnetUrl: Option<String>,
    downloadUrl: Option<String>,
    infoHash: Option<String>,
    size: Option<i64>,
    seeders: Option<i64>,
    leechers: Option<i64>,
    #[serde(default)]
    categories: Vec<ProwlarrCategory>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProwlarrCategory {
    Id(i64),
    Object { id: i64 },
}

impl ProwlarrCategory {
    fn id(&self) -> i64 {
        match self {
            ProwlarrCategory::Id(id) | ProwlarrCategory::Object { id } => *id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::AdapterEndpoint;

    fn adapter(kind: AdapterKind, url: &str) -> TorznabAdapter {
        TorznabAdapter::new("idx", kind, url, "test-key", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_build_jackett_url() {
        let adapter = adapter(AdapterKind::Jackett, "http://localhost:9117/");
        let query = SearchQuery::new("test query").with_category(MediaCategory::Movie);
        let url = adapter.build_search_url(&query);
        assert!(url.starts_with("http://localhost:9117/api/v2.0/indexers/all/results"));
        assert!(url.contains("apikey=test-key"));
        assert!(url.contains("Query=test%20query"));
        assert!(url.contains("Category[]=2000"));
        assert!(!url.contains("Category[]=5000"));
    }

    #[test]
    fn test_build_prowlarr_url() {
        let adapter = adapter(AdapterKind::Prowlarr, "http://prowlarr:9696");
        let url = adapter.build_search_url(&SearchQuery::new("Show S01E02"));
        assert_eq!(
            url,
            "http://prowlarr:9696/api/v1/search?query=Show%20S01E02&categories=2000,5000&type=search"
        );
    }

    #[test]
    fn test_endpoint_override() {
        let adapter = adapter(AdapterKind::Jackett, "http://default:9117");
        let mut query = SearchQuery::new("x");
        query.endpoints.insert(
            "idx".to_string(),
            AdapterEndpoint {
                url: Some("http://override:1234".to_string()),
                api_key: Some("other".to_string()),
            },
        );
        let url = adapter.build_search_url(&query);
        assert!(url.starts_with("http://override:1234/"));
        assert!(url.contains("apikey=other"));
    }

    #[test]
    fn test_parse_jackett_results() {
        let adapter = adapter(AdapterKind::Jackett, "http://localhost:9117");
        let json = r#"{"Results": [
            {"Title": "Movie.2020.1080p.WEB-DL", "Tracker": "SiteA",
             "MagnetUri": "magnet:?xt=urn:btih:abc", "Size": 1000, "Seeders": 12,
             "Peers": 3, "InfoHash": "ABC", "CategoryDesc": "Movies/HD"},
            {"Title": "No link", "Seeders": -1}
        ]}"#;
        let body: JackettResponse = serde_json::from_str(json).unwrap();
        let results: Vec<_> = body
            .Results
            .into_iter()
            .filter_map(|r| adapter.convert_jackett(r))
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tracker, "idx|SiteA");
        assert_eq!(results[0].seeders, Some(12));
        assert_eq!(results[0].category.as_deref(), Some("Movies/HD"));
    }

    #[test]
    fn test_parse_prowlarr_results() {
        let adapter = adapter(AdapterKind::Prowlarr, "http://prowlarr:9696");
        let json = r#"[
            {"title": "Show.S01E01.720p", "indexer": "SiteB",
             "downloadUrl": "https://x/dl.torrent", "size": 500, "seeders": 4,
             "categories": [{"id": 5030, "name": "TV/SD"}]},
            {"title": "Movie", "magnetUrl": "magnet:?xt=urn:btih:def", "categories": [2000]}
        ]"#;
        let body: Vec<ProwlarrResult> = serde_json::from_str(json).unwrap();
        let results: Vec<_> = body
            .into_iter()
            .filter_map(|r| adapter.convert_prowlarr(r))
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].category.as_deref(), Some("TV"));
        assert_eq!(results[0].tracker, "idx|SiteB");
        assert_eq!(results[1].category.as_deref(), Some("Movies"));
        assert_eq!(results[1].tracker, "idx");
    }

    #[tokio::test]
    async fn test_unconfigured_adapter_fails() {
        let adapter = TorznabAdapter::new(
            "empty",
            AdapterKind::Jackett,
            "",
            "",
            Duration::from_secs(1),
        )
        .unwrap();
        let err = adapter.search(&SearchQuery::new("x")).await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConfigured(_)));
    }
}
