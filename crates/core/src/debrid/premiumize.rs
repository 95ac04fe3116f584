//! Premiumize client.
//!
//! Availability goes through the bulk `cache/check` call, then the StremThru
//! proxy, then `cache/check` again in sequential sub-batches.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::fallback::{FallbackChain, SequentialBatches};
use super::http::{build_client, ensure_success, is_video_file};
use super::stremthru::{StremThruCheck, DEFAULT_STREMTHRU_BASE};
use super::types::{AvailabilityMap, CacheService, CheckStrategy, DebridError};

pub const DEFAULT_API_BASE: &str = "https://www.premiumize.me/api";

const SEQUENTIAL_BATCH_SIZE: usize = 10;
const SEQUENTIAL_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct CacheCheckResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    response: Vec<bool>,
}

#[derive(Debug, Deserialize)]
struct DirectDlResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    content: Vec<DirectDlFile>,
}

#[derive(Debug, Deserialize)]
struct DirectDlFile {
    #[serde(default)]
    path: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    link: Option<String>,
}

fn status_error(message: Option<String>) -> DebridError {
    DebridError::Parse(message.unwrap_or_else(|| "status was not success".to_string()))
}

/// `cache/check` call. The response is a boolean array aligned with the
/// requested items.
#[derive(Clone)]
pub struct CacheCheck {
    client: Client,
    base: String,
    api_key: String,
}

impl CacheCheck {
    pub fn new(client: Client, base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CheckStrategy for CacheCheck {
    fn name(&self) -> &str {
        "direct"
    }

    async fn check(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        let mut params: Vec<(&str, &str)> = vec![("apikey", self.api_key.as_str())];
        params.extend(hashes.iter().map(|h| ("items[]", h.as_str())));

        let response = self
            .client
            .get(format!("{}/cache/check", self.base))
            .query(&params)
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let body: CacheCheckResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;

        if body.status != "success" {
            return Err(status_error(body.message));
        }

        Ok(hashes
            .iter()
            .zip(body.response.iter().copied())
            .map(|(h, cached)| (h.clone(), cached))
            .collect())
    }
}

/// Premiumize cache service.
pub struct Premiumize {
    client: Client,
    base: String,
    api_key: String,
    chain: FallbackChain,
}

impl Premiumize {
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
        let direct = CacheCheck::new(client.clone(), api_base, api_key.clone());
        let proxy = StremThruCheck::new(client.clone(), proxy_base, "premiumize", api_key.clone());

        let chain = FallbackChain::new("Premiumize")
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
}

#[async_trait]
impl CacheService for Premiumize {
    fn name(&self) -> &str {
        "Premiumize"
    }

    async fn check_cached_batch(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        self.chain.run(hashes).await
    }

    async fn get_accelerated_link(&self, magnet: &str) -> Result<Option<String>, DebridError> {
        let response = self
            .client
            .post(format!("{}/transfer/directdl", self.base))
            .form(&[("apikey", self.api_key.as_str()), ("src", magnet)])
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let body: DirectDlResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;

        if body.status != "success" {
            return Err(status_error(body.message));
        }

        Ok(body
            .content
            .into_iter()
            .filter(|f| is_video_file(&f.path))
            .max_by_key(|f| f.size)
            .and_then(|f| f.link))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_check_response_parsing() {
        let body: CacheCheckResponse =
            serde_json::from_str(r#"{"status":"success","response":[true,false]}"#).unwrap();
        assert_eq!(body.response, vec![true, false]);

        let body: CacheCheckResponse =
            serde_json::from_str(r#"{"status":"error","message":"Invalid API key"}"#).unwrap();
        assert_eq!(body.status, "error");
        assert!(body.response.is_empty());
    }

    #[test]
    fn test_chain_has_three_steps() {
        let pm = Premiumize::new("0123456789abcdef", Duration::from_secs(5)).unwrap();
        assert_eq!(pm.chain.len(), 3);
        assert_eq!(pm.name(), "Premiumize");
    }
}
