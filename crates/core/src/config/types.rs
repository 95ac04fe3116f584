use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::debrid::DebridServiceKind;
use crate::pipeline::Preferences;
use crate::ranking::ScoreTable;
use crate::searcher::{DedupStrategy, HealthConfig, TrackerLists};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Preferences applied when a request carries none.
    #[serde(default)]
    pub preferences: Preferences,
    /// Source adapter registry, in registration order.
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
    /// Acceleration-service credentials.
    #[serde(default)]
    pub debrid: Vec<DebridConfig>,
    /// Score table override; the built-in table when absent.
    #[serde(default)]
    pub ranking: Option<ScoreTable>,
    /// Announce URLs appended to emitted magnets.
    #[serde(default)]
    pub trackers: TrackerLists,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    7000
}

/// Fan-out deadline presets.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchSpeed {
    Fast,
    #[default]
    Balanced,
    Thorough,
}

impl SearchSpeed {
    pub fn timeout(&self) -> Duration {
        match self {
            SearchSpeed::Fast => Duration::from_secs(8),
            SearchSpeed::Balanced => Duration::from_secs(20),
            SearchSpeed::Thorough => Duration::from_secs(45),
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Explicit global deadline; overrides `speed` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub speed: SearchSpeed,
    #[serde(default = "DedupStrategy::defaults")]
    pub dedup_strategies: Vec<DedupStrategy>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            speed: SearchSpeed::default(),
            dedup_strategies: DedupStrategy::defaults(),
        }
    }
}

impl SearchConfig {
    /// Effective global fan-out deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.speed.timeout())
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_sweep")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            sweep_interval_secs: default_cache_sweep(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    600
}

fn default_cache_sweep() -> u64 {
    300
}

/// Available adapter backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Jackett,
    Prowlarr,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::Jackett => "jackett",
            AdapterKind::Prowlarr => "prowlarr",
        }
    }
}

/// One registered source adapter
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdapterConfig {
    /// Unique adapter name, used in health records and tracker labels
    pub name: String,
    pub kind: AdapterKind,
    /// Server URL (e.g., "http://localhost:9117")
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Per-request HTTP timeout in seconds (default: 30)
    #[serde(default = "default_adapter_timeout")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_adapter_timeout() -> u64 {
    30
}

/// Credentials for one acceleration service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DebridConfig {
    pub service: DebridServiceKind,
    pub api_key: String,
    #[serde(default = "default_debrid_timeout")]
    pub timeout_secs: u64,
}

fn default_debrid_timeout() -> u64 {
    15
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub health: HealthConfig,
    pub cache: CacheConfig,
    pub preferences: Preferences,
    pub adapters: Vec<SanitizedAdapterConfig>,
    pub debrid: Vec<SanitizedDebridConfig>,
    pub ranking_overridden: bool,
    pub trackers: TrackerLists,
}

/// Sanitized adapter config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAdapterConfig {
    pub name: String,
    pub kind: AdapterKind,
    pub url: String,
    pub api_key_configured: bool,
    pub enabled: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDebridConfig {
    pub service: DebridServiceKind,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            search: config.search.clone(),
            health: config.health.clone(),
            cache: config.cache.clone(),
            preferences: config.preferences.clone(),
            adapters: config
                .adapters
                .iter()
                .map(|a| SanitizedAdapterConfig {
                    name: a.name.clone(),
                    kind: a.kind,
                    url: a.url.clone(),
                    api_key_configured: !a.api_key.is_empty(),
                    enabled: a.enabled,
                    timeout_secs: a.timeout_secs,
                })
                .collect(),
            debrid: config
                .debrid
                .iter()
                .map(|d| SanitizedDebridConfig {
                    service: d.service,
                    api_key_configured: !d.api_key.is_empty(),
                    timeout_secs: d.timeout_secs,
                })
                .collect(),
            ranking_overridden: config.ranking.is_some(),
            trackers: config.trackers.clone(),
        }
    }
}
