//! AllDebrid client.
//!
//! Availability goes through the bulk `magnet/instant` call, then the
//! StremThru proxy, then `magnet/instant` again in sequential sub-batches.
//! AllDebrid answers errors with HTTP 200 and a `status: "error"` envelope,
//! so every response body is checked, not just the status line.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::searcher::normalize_info_hash;

use super::fallback::{FallbackChain, SequentialBatches};
use super::http::{build_client, ensure_success, is_video_file};
use super::stremthru::{StremThruCheck, DEFAULT_STREMTHRU_BASE};
use super::types::{AvailabilityMap, CacheService, CheckStrategy, DebridError};

pub const DEFAULT_API_BASE: &str = "https://api.alldebrid.com/v4";

/// Sent as the `agent` parameter on every call.
const AGENT: &str = "yarr";

const SEQUENTIAL_BATCH_SIZE: usize = 10;
const SEQUENTIAL_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl ApiError {
    fn into_debrid_error(self) -> DebridError {
        let message = if self.message.is_empty() {
            self.code.clone()
        } else {
            format!("{}: {}", self.code, self.message)
        };
        if self.code.contains("DISABLED") || self.code.contains("DEPRECATED") {
            DebridError::DisabledEndpoint(message)
        } else {
            DebridError::Parse(message)
        }
    }
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, DebridError> {
        let Envelope {
            status,
            data,
            error,
        } = self;
        if status != "success" {
            return Err(match error {
                Some(error) => error.into_debrid_error(),
                None => DebridError::Parse(format!("status {}", status)),
            });
        }
        data.ok_or_else(|| DebridError::Parse("response has no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct InstantData {
    #[serde(default)]
    magnets: Vec<InstantEntry>,
}

#[derive(Debug, Deserialize)]
struct InstantEntry {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    instant: bool,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    #[serde(default)]
    magnets: Vec<UploadedMagnet>,
}

#[derive(Debug, Deserialize)]
struct UploadedMagnet {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    magnets: OneOrMany<MagnetStatus>,
}

/// `magnet/status` returns an object for a single id and an array otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MagnetStatus {
    #[serde(default)]
    links: Vec<MagnetLink>,
}

#[derive(Debug, Clone, Deserialize)]
struct MagnetLink {
    link: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct UnlockData {
    link: String,
}

async fn get_envelope<T: DeserializeOwned>(
    client: &Client,
    url: String,
    params: &[(&str, &str)],
) -> Result<T, DebridError> {
    let response = client
        .get(url)
        .query(params)
        .send()
        .await
        .map_err(DebridError::from_reqwest)?;
    let envelope: Envelope<T> = ensure_success(response)
        .await?
        .json()
        .await
        .map_err(|e| DebridError::Parse(e.to_string()))?;
    envelope.into_data()
}

/// Bulk `magnet/instant` call.
#[derive(Clone)]
pub struct InstantCheck {
    client: Client,
    base: String,
    api_key: String,
}

impl InstantCheck {
    pub fn new(client: Client, base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CheckStrategy for InstantCheck {
    fn name(&self) -> &str {
        "direct"
    }

    async fn check(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        let mut params: Vec<(&str, &str)> =
            vec![("agent", AGENT), ("apikey", self.api_key.as_str())];
        params.extend(hashes.iter().map(|h| ("magnets[]", h.as_str())));

        let data: InstantData =
            get_envelope(&self.client, format!("{}/magnet/instant", self.base), &params).await?;

        // Entries follow request order; the echoed hash wins when present.
        Ok(data
            .magnets
            .into_iter()
            .zip(hashes)
            .map(|(entry, requested)| {
                let hash = entry
                    .hash
                    .as_deref()
                    .and_then(normalize_info_hash)
                    .unwrap_or_else(|| requested.clone());
                (hash, entry.instant)
            })
            .collect())
    }
}

/// AllDebrid cache service.
pub struct AllDebrid {
    client: Client,
    base: String,
    api_key: String,
    chain: FallbackChain,
}

impl AllDebrid {
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
        let direct = InstantCheck::new(client.clone(), api_base, api_key.clone());
        let proxy = StremThruCheck::new(client.clone(), proxy_base, "alldebrid", api_key.clone());

        let chain = FallbackChain::new("AllDebrid")
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

    async fn upload(&self, magnet: &str) -> Result<Option<i64>, DebridError> {
        let data: UploadData = get_envelope(
            &self.client,
            format!("{}/magnet/upload", self.base),
            &[("agent", AGENT), ("apikey", self.api_key.as_str()), ("magnets[]", magnet)],
        )
        .await?;

        let Some(uploaded) = data.magnets.into_iter().next() else {
            return Ok(None);
        };
        if let Some(error) = uploaded.error {
            return Err(error.into_debrid_error());
        }
        Ok(uploaded.id)
    }

    async fn links(&self, id: i64) -> Result<Vec<MagnetLink>, DebridError> {
        let id = id.to_string();
        let data: StatusData = get_envelope(
            &self.client,
            format!("{}/magnet/status", self.base),
            &[("agent", AGENT), ("apikey", self.api_key.as_str()), ("id", id.as_str())],
        )
        .await?;
        Ok(data
            .magnets
            .into_first()
            .map(|m| m.links)
            .unwrap_or_default())
    }

    async fn unlock(&self, link: &str) -> Result<String, DebridError> {
        let data: UnlockData = get_envelope(
            &self.client,
            format!("{}/link/unlock", self.base),
            &[("agent", AGENT), ("apikey", self.api_key.as_str()), ("link", link)],
        )
        .await?;
        Ok(data.link)
    }
}

/// Largest playable link, or the first link when none looks like a video.
fn pick_link(links: &[MagnetLink]) -> Option<&MagnetLink> {
    links
        .iter()
        .filter(|l| is_video_file(&l.filename))
        .max_by_key(|l| l.size)
        .or_else(|| links.first())
}

#[async_trait]
impl CacheService for AllDebrid {
    fn name(&self) -> &str {
        "AllDebrid"
    }

    async fn check_cached_batch(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        self.chain.run(hashes).await
    }

    async fn get_accelerated_link(&self, magnet: &str) -> Result<Option<String>, DebridError> {
        let Some(id) = self.upload(magnet).await? else {
            debug!("AllDebrid accepted no magnet");
            return Ok(None);
        };
        let links = self.links(id).await?;
        let Some(link) = pick_link(&links) else {
            debug!(id = id, "AllDebrid magnet has no links yet");
            return Ok(None);
        };
        self.unlock(&link.link).await.map(Some)
    }
}
