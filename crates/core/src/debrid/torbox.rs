//! TorBox client.
//!
//! Availability goes through the bulk `checkcached` call, then the StremThru
//! proxy, then `checkcached` again in sequential sub-batches.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::searcher::normalize_info_hash;

use super::fallback::{FallbackChain, SequentialBatches};
use super::http::{build_client, ensure_success, is_video_file};
use super::stremthru::{StremThruCheck, DEFAULT_STREMTHRU_BASE};
use super::types::{AvailabilityMap, CacheService, CheckStrategy, DebridError};

pub const DEFAULT_API_BASE: &str = "https://api.torbox.app/v1/api";

const SEQUENTIAL_BATCH_SIZE: usize = 10;
const SEQUENTIAL_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    detail: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<Option<T>, DebridError> {
        if !self.success {
            return Err(DebridError::Parse(
                self.detail
                    .unwrap_or_else(|| "request unsuccessful".to_string()),
            ));
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
struct CachedEntry {
    hash: String,
    #[serde(default)]
    files: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CreatedTorrent {
    torrent_id: i64,
}

#[derive(Debug, Deserialize)]
struct TorrentDetails {
    #[serde(default)]
    files: Vec<TorrentFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct TorrentFile {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
}

/// Bulk `checkcached` call.
#[derive(Clone)]
pub struct CheckCached {
    client: Client,
    base: String,
    api_key: String,
}

impl CheckCached {
    pub fn new(client: Client, base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CheckStrategy for CheckCached {
    fn name(&self) -> &str {
        "direct"
    }

    async fn check(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        let response = self
            .client
            .post(format!(
                "{}/torrents/checkcached?format=list&list_files=true",
                self.base
            ))
            .bearer_auth(&self.api_key)
            .json(&json!({ "hashes": hashes }))
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let envelope: Envelope<Vec<CachedEntry>> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;

        Ok(envelope
            .into_data()?
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                normalize_info_hash(&entry.hash).map(|h| (h, !entry.files.is_empty()))
            })
            .collect())
    }
}

/// TorBox cache service.
pub struct Torbox {
    client: Client,
    base: String,
    api_key: String,
    chain: FallbackChain,
}

impl Torbox {
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
        let direct = CheckCached::new(client.clone(), api_base, api_key.clone());
        let proxy = StremThruCheck::new(client.clone(), proxy_base, "torbox", api_key.clone());

        let chain = FallbackChain::new("TorBox")
            .then(direct.clone())
            .then(proxy)
            .then(SequentialBatches::new(
                direct,
                SEQUENTIAL_BATCH_SIZE,
                SEQUENTIAL_DELAY,
            ));

        Ok(Self {
            client,
            base: api_base.trim_end_matches('/').to_string(),
            api_key,
            chain,
        })
    }

    async fn create_torrent(&self, magnet: &str) -> Result<i64, DebridError> {
        let response = self
            .client
            .post(format!("{}/torrents/createtorrent", self.base))
            .bearer_auth(&self.api_key)
            .json(&json!({ "magnet": magnet }))
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let envelope: Envelope<CreatedTorrent> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;
        envelope
            .into_data()?
            .map(|d| d.torrent_id)
            .ok_or_else(|| DebridError::Parse("createtorrent returned no torrent id".into()))
    }

    async fn torrent_files(&self, torrent_id: i64) -> Result<Vec<TorrentFile>, DebridError> {
        let response = self
            .client
            .get(format!("{}/torrents/mylist?id={}", self.base, torrent_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let envelope: Envelope<TorrentDetails> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;
        Ok(envelope.into_data()?.map(|d| d.files).unwrap_or_default())
    }

    async fn request_download(&self, torrent_id: i64, file_id: i64) -> Result<Option<String>, DebridError> {
        let url = format!(
            "{}/torrents/requestdl?token={}&torrent_id={}&file_id={}",
            self.base,
            urlencoding::encode(&self.api_key),
            torrent_id,
            file_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let envelope: Envelope<String> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;
        envelope.into_data()
    }
}

/// Largest playable file in a torrent.
fn pick_largest_video(files: &[TorrentFile]) -> Option<&TorrentFile> {
    files
        .iter()
        .filter(|f| is_video_file(&f.name))
        .max_by_key(|f| f.size)
}

#[async_trait]
impl CacheService for Torbox {
    fn name(&self) -> &str {
        "TorBox"
    }

    async fn check_cached_batch(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        self.chain.run(hashes).await
    }

    async fn get_accelerated_link(&self, magnet: &str) -> Result<Option<String>, DebridError> {
        let torrent_id = self.create_torrent(magnet).await?;
        let files = self.torrent_files(torrent_id).await?;
        let Some(file) = pick_largest_video(&files) else {
            debug!(torrent_id = torrent_id, "TorBox torrent has no video files");
            return Ok(None);
        };
        self.request_download(torrent_id, file.id).await
    }
}
