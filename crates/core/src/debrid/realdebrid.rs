//! RealDebrid client.
//!
//! Availability is checked with a three-step fallback chain: the bulk
//! `instantAvailability` endpoint, then the StremThru proxy (which fronts the
//! same store), then the bulk endpoint again in sequential sub-batches of 10.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::searcher::normalize_info_hash;

use super::fallback::{FallbackChain, SequentialBatches};
use super::http::{build_client, ensure_success};
use super::stremthru::{StremThruCheck, DEFAULT_STREMTHRU_BASE};
use super::types::{AvailabilityMap, CacheService, CheckStrategy, DebridError};

pub const DEFAULT_API_BASE: &str = "https://api.real-debrid.com/rest/1.0";

const SEQUENTIAL_BATCH_SIZE: usize = 10;
const SEQUENTIAL_DELAY: Duration = Duration::from_millis(200);

/// Bulk availability check against the RealDebrid API.
#[derive(Clone)]
pub struct InstantAvailability {
    client: Client,
    base: String,
    api_key: String,
}

impl InstantAvailability {
    pub fn new(client: Client, base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CheckStrategy for InstantAvailability {
    fn name(&self) -> &str {
        "direct"
    }

    async fn check(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        let url = format!(
            "{}/torrents/instantAvailability/{}",
            self.base,
            hashes.join("/")
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let body: HashMap<String, Value> = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;

        Ok(body
            .into_iter()
            .filter_map(|(hash, entry)| {
                normalize_info_hash(&hash).map(|h| (h, has_rd_variant(&entry)))
            })
            .collect())
    }
}

/// A hash is cached when `rd` holds at least one non-empty file variant.
fn has_rd_variant(entry: &Value) -> bool {
    entry
        .get("rd")
        .and_then(Value::as_array)
        .and_then(|variants| variants.first())
        .and_then(Value::as_object)
        .is_some_and(|files| !files.is_empty())
}

#[derive(Debug, Deserialize)]
struct AddMagnetResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TorrentInfo {
    #[serde(default)]
    links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UnrestrictResponse {
    download: String,
}

/// RealDebrid cache service.
pub struct RealDebrid {
    client: Client,
    base: String,
    api_key: String,
    chain: FallbackChain,
}

impl RealDebrid {
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
        let direct = InstantAvailability::new(client.clone(), api_base, api_key.clone());
        let proxy = StremThruCheck::new(client.clone(), proxy_base, "realdebrid", api_key.clone());

        let chain = FallbackChain::new("RealDebrid")
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

    async fn add_magnet(&self, magnet: &str) -> Result<String, DebridError> {
        let response = self
            .client
            .post(format!("{}/torrents/addMagnet", self.base))
            .bearer_auth(&self.api_key)
            .form(&[("magnet", magnet)])
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let added: AddMagnetResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;
        Ok(added.id)
    }

    async fn select_all_files(&self, id: &str) -> Result<(), DebridError> {
        let response = self
            .client
            .post(format!("{}/torrents/selectFiles/{}", self.base, id))
            .bearer_auth(&self.api_key)
            .form(&[("files", "all")])
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn torrent_links(&self, id: &str) -> Result<Vec<String>, DebridError> {
        let response = self
            .client
            .get(format!("{}/torrents/info/{}", self.base, id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let info: TorrentInfo = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;
        Ok(info.links)
    }

    async fn unrestrict(&self, link: &str) -> Result<String, DebridError> {
        let response = self
            .client
            .post(format!("{}/unrestrict/link", self.base))
            .bearer_auth(&self.api_key)
            .form(&[("link", link)])
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let unrestricted: UnrestrictResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;
        Ok(unrestricted.download)
    }
}

#[async_trait]
impl CacheService for RealDebrid {
    fn name(&self) -> &str {
        "RealDebrid"
    }

    async fn check_cached_batch(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        self.chain.run(hashes).await
    }

    async fn get_accelerated_link(&self, magnet: &str) -> Result<Option<String>, DebridError> {
        let id = self.add_magnet(magnet).await?;
        debug!(id = %id, "Magnet added to RealDebrid");
        self.select_all_files(&id).await?;

        let links = self.torrent_links(&id).await?;
        let Some(first) = links.first() else {
            info!(id = %id, "RealDebrid returned no links yet");
            return Ok(None);
        };

        self.unrestrict(first).await.map(Some)
    }
}
