//! Types for cache-acceleration (debrid) services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Availability of a batch of hashes on one service.
pub type AvailabilityMap = HashMap<String, bool>;

/// Supported acceleration services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DebridServiceKind {
    RealDebrid,
    Torbox,
    Premiumize,
    AllDebrid,
    DebridLink,
}

impl DebridServiceKind {
    /// Display name, also used as the service key in availability maps.
    pub fn display_name(&self) -> &'static str {
        match self {
            DebridServiceKind::RealDebrid => "RealDebrid",
            DebridServiceKind::Torbox => "TorBox",
            DebridServiceKind::Premiumize => "Premiumize",
            DebridServiceKind::AllDebrid => "AllDebrid",
            DebridServiceKind::DebridLink => "DebridLink",
        }
    }

    /// Short tag shown next to cached results.
    pub fn short_name(&self) -> &'static str {
        match self {
            DebridServiceKind::RealDebrid => "RD",
            DebridServiceKind::Torbox => "TB",
            DebridServiceKind::Premiumize => "PM",
            DebridServiceKind::AllDebrid => "AD",
            DebridServiceKind::DebridLink => "DL",
        }
    }
}

/// Errors from acceleration-service calls. Always isolated per service.
#[derive(Debug, Clone, Error)]
pub enum DebridError {
    #[error("HTTP {status}{}: {message}", .code.map(|c| format!(" (error code {})", c)).unwrap_or_default())]
    Http {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("Endpoint disabled: {0}")]
    DisabledEndpoint(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("All check methods failed for {service}: {}", .attempts.join("; "))]
    Exhausted {
        service: String,
        attempts: Vec<String>,
    },
}

impl DebridError {
    /// Whether the service refused this method (403 or a disabled endpoint),
    /// as opposed to a transient failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DebridError::DisabledEndpoint(_)
                | DebridError::Unsupported(_)
                | DebridError::Http { status: 403, .. }
        )
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DebridError::Timeout
        } else if e.is_connect() {
            DebridError::ConnectionFailed(e.to_string())
        } else if let Some(status) = e.status() {
            DebridError::Http {
                status: status.as_u16(),
                code: None,
                message: e.to_string(),
            }
        } else if e.is_decode() {
            DebridError::Parse(e.to_string())
        } else {
            DebridError::ConnectionFailed(e.to_string())
        }
    }
}

/// Contract every acceleration service implements. Each instance carries its
/// own credential.
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Service name used as the key in availability results.
    fn name(&self) -> &str;

    /// Check which hashes are instantly available.
    ///
    /// Implementations return an entry for every requested hash.
    async fn check_cached_batch(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError>;

    /// Resolve a magnet to a direct HTTP link, or `None` if the service has
    /// nothing playable for it.
    async fn get_accelerated_link(&self, magnet: &str) -> Result<Option<String>, DebridError>;
}

/// One way of checking availability, used as a step of a fallback chain.
#[async_trait]
pub trait CheckStrategy: Send + Sync {
    /// Method name for logs and metrics.
    fn name(&self) -> &str;

    async fn check(&self, hashes: &[String]) -> Result<AvailabilityMap, DebridError>;
}
