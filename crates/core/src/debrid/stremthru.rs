//! StremThru proxy check, usable as the second step of any service's chain.
//!
//! StremThru fronts the same stores as the services themselves and takes the
//! store name and credential in headers, so one strategy serves them all.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::searcher::normalize_info_hash;

use super::http::ensure_success;
use super::types::{AvailabilityMap, CheckStrategy, DebridError};

pub const DEFAULT_STREMTHRU_BASE: &str = "https://stremthru.elfhosted.com";

#[derive(Debug, Deserialize)]
struct StremThruResponse {
    data: StremThruData,
}

#[derive(Debug, Deserialize)]
struct StremThruData {
    #[serde(default)]
    items: Vec<StremThruItem>,
}

#[derive(Debug, Deserialize)]
struct StremThruItem {
    hash: String,
    #[serde(default)]
    status: String,
}

/// Availability check through a StremThru proxy for a given store.
#[derive(Clone)]
pub struct StremThruCheck {
    client: Client,
    base: String,
    store: String,
    api_key: String,
}

impl StremThruCheck {
    pub fn new(
        client: Client,
        base: impl Into<String>,
        store: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
            store: store.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl CheckStrategy for StremThruCheck {
    fn name(&self) -> &str {
        "proxy"
    }

    async fn check(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError> {
        let magnets: Vec<String> = hashes
            .iter()
            .map(|h| format!("magnet:?xt=urn:btih:{}", h))
            .collect();
        let url = format!(
            "{}/v0/store/magnets/check?magnet={}",
            self.base,
            urlencoding::encode(&magnets.join(","))
        );

        let response = self
            .client
            .get(&url)
            .header("X-StremThru-Store-Name", &self.store)
            .header(
                "X-StremThru-Store-Authorization",
                format!("Bearer {}", self.api_key),
            )
            .send()
            .await
            .map_err(DebridError::from_reqwest)?;
        let body: StremThruResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| DebridError::Parse(e.to_string()))?;

        Ok(body
            .data
            .items
            .into_iter()
            .filter_map(|item| {
                normalize_info_hash(&item.hash).map(|h| (h, item.status == "cached"))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stremthru_response_parsing() {
        let body: StremThruResponse = serde_json::from_value(json!({
            "data": {"items": [
                {"hash": "A".repeat(40), "status": "cached"},
                {"hash": "b".repeat(40), "status": "downloading"},
                {"hash": "not-a-hash", "status": "cached"}
            ]}
        }))
        .unwrap();
        assert_eq!(body.data.items.len(), 3);
        assert_eq!(body.data.items[0].status, "cached");
    }
}
