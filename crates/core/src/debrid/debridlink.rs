//! Debrid-Link client.
//!
//! `seedbox/cached` answers for one magnet per call, so the direct step only
//! takes single-hash batches. Larger batches go to the StremThru proxy and,
//! failing that, to the direct step one hash at a time.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::fallback::{FallbackChain, SequentialBatches};
use super::http::{build_client, ensure_success, is_video_file};
use super::stremthru::{StremThruCheck, DEFAULT_STREMTHRU_BASE};
use super::types::{AvailabilityMap, CacheService, CheckStrategy, DebridError};

pub const DEFAULT_API_BASE: &str = "https://debrid-link.fr/api/v2";

const SEQUENTIAL_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    value: Option<T>,
}

impl<T> Envelope<T> {
    fn into_value(self) -> Result<Option<T>, DebridError> {
        if !self.success {
            return Err(DebridError::Parse(
                self.error
                    .unwrap_or_else(|| "request unsuccessful".to_string()),
            ));
        }
        Ok(self.value)
    }
}

#[derive(Debug, Deserialize)]
struct AddedTorrent {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SeedboxTorrent {
    id: String,
    #[serde(default)]
    files: Vec<SeedboxFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedboxFile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    download_url: Option<String>,
}

/// Single-magnet `seedbox/cached` call.
#[derive(Clone)]
pub struct SeedboxCached {
    client: Client,
    base: String,
    api_key: String,
}

impl SeedboxCached {
    pub fn new(client: Client, base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

/// A hash is cached when the service returns any entry for it.
fn has_entries(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl CheckStrategy for SeedboxCached {
    fn name(&self) -> &str {
        "direct"
    }

    async fn check(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        let [hash] = hashes else {
            return Err(DebridError::Unsupported(format!(
                "seedbox/cached takes one magnet, got {}",
                hashes.len()
            )));
        };

        let response = self
            .client
            .post(format!("{}/seedbox/cached", self.base))
            .bearer_auth(&self.api_key)
            .json(&json!({ "url": format!("magnet:?xt=urn:btih:{}", hash) }))
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let envelope: Envelope<Value> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;

        let cached = envelope.into_value()?.as_ref().is_some_and(has_entries);
        Ok(AvailabilityMap::from([(hash.clone(), cached)]))
    }
}

/// Debrid-Link cache service.
pub struct DebridLink {
    client: Client,
    base: String,
    api_key: String,
    chain: FallbackChain,
}

impl DebridLink {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, DebridError> {
        Self::with_endpoints(api_key, timeout, DEFAULT_API_BASE, DEFAULT_STREMTHRU_BASE)
    }

    /// Build a client against non-default endpoints.
    pub fn with_endpoints(
        api_key: impl Into<String>,
        timeout: Duration,
        api_base: &str,
        proxy_base: &str,
    ) -> Result<Self, DebridError> {
        let api_key = api_key.into();
        let client = build_client(timeout)?;
        let direct = SeedboxCached::new(client.clone(), api_base, api_key.clone());
        let proxy = StremThruCheck::new(client.clone(), proxy_base, "debridlink", api_key.clone());

        let chain = FallbackChain::new("DebridLink")
            .then(direct.clone())
            .then(proxy)
            .then(SequentialBatches::new(direct, 1, SEQUENTIAL_DELAY));

        Ok(Self {
            client,
            base: api_base.trim_end_matches('/').to_string(),
            api_key,
            chain,
        })
    }

    async fn add(&self, magnet: &str) -> Result<Option<String>, DebridError> {
        let response = self
            .client
            .post(format!("{}/seedbox/add", self.base))
            .bearer_auth(&self.api_key)
            .json(&json!({ "url": magnet, "async": false }))
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let envelope: Envelope<AddedTorrent> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;
        Ok(envelope.into_value()?.map(|t| t.id))
    }

    async fn files(&self, id: &str) -> Result<Vec<SeedboxFile>, DebridError> {
        let response = self
            .client
            .get(format!("{}/seedbox/list", self.base))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let envelope: Envelope<Vec<SeedboxTorrent>> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;
        Ok(envelope
            .into_value()?
            .unwrap_or_default()
            .into_iter()
            .find(|t| t.id == id)
            .map(|t| t.files)
            .unwrap_or_default())
    }
}

/// Download URL of the largest playable file.
fn pick_largest_video(files: &[SeedboxFile]) -> Option<String> {
    files
        .iter()
        .filter(|f| is_video_file(&f.name))
        .max_by_key(|f| f.size)
        .and_then(|f| f.download_url.clone())
}

#[async_trait]
impl CacheService for DebridLink {
    fn name(&self) -> &str {
        "DebridLink"
    }

    async fn check_cached_batch(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        self.chain.run(hashes).await
    }

    async fn get_accelerated_link(&self, magnet: &str) -> Result<Option<String>, DebridError> {
        let Some(id) = self.add(magnet).await? else {
            return Ok(None);
        };
        let files = self.files(&id).await?;
        let link = pick_largest_video(&files);
        if link.is_none() {
            debug!(id = %id, "Debrid-Link torrent has no playable file");
        }
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_entries() {
        assert!(has_entries(&json!([{"name": "a.mkv"}])));
        assert!(has_entries(&json!({"abc": {"files": []}})));
        assert!(!has_entries(&json!([])));
        assert!(!has_entries(&json!({})));
        assert!(!has_entries(&Value::Null));
    }

    #[tokio::test]
    async fn test_multi_hash_batch_is_unsupported() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let step = SeedboxCached::new(client, "http://127.0.0.1:9", "key");
        let err = step
            .check(&["a".repeat(40), "b".repeat(40)])
            .await
            .unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_pick_largest_video() {
        let files: Vec<SeedboxFile> = serde_json::from_value(json!([
            {"name": "sample.mkv", "size": 10, "downloadUrl": "https://dl/sample"},
            {"name": "movie.mkv", "size": 900, "downloadUrl": "https://dl/movie"},
            {"name": "extras.rar", "size": 5000, "downloadUrl": "https://dl/rar"}
        ]))
        .unwrap();
        assert_eq!(pick_largest_video(&files).as_deref(), Some("https://dl/movie"));
    }

    #[test]
    fn test_chain_has_three_steps() {
        let dl = DebridLink::new("0123456789abcdef", Duration::from_secs(5)).unwrap();
        assert_eq!(dl.chain.len(), 3);
        assert_eq!(dl.name(), "DebridLink");
    }
}
