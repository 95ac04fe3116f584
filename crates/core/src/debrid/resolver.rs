//! Multi-service availability resolution.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::DebridConfig;

use super::alldebrid::AllDebrid;
use super::debridlink::DebridLink;
use super::fallback::complete;
use super::premiumize::Premiumize;
use super::realdebrid::RealDebrid;
use super::torbox::Torbox;
use super::types::{CacheService, DebridError, DebridServiceKind};

/// Per-hash availability across every configured service.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheAvailability {
    /// Service names in configuration order.
    services: Vec<String>,
    /// hash -> service -> instantly available.
    by_hash: HashMap<String, HashMap<String, bool>>,
}

impl CacheAvailability {
    /// Services reporting this hash as instantly available, in configuration order.
    pub fn services_for(&self, hash: &str) -> Vec<String> {
        let Some(entry) = self.by_hash.get(hash) else {
            return Vec::new();
        };
        self.services
            .iter()
            .filter(|s| entry.get(s.as_str()).copied().unwrap_or(false))
            .cloned()
            .collect()
    }

    pub fn is_available(&self, hash: &str) -> bool {
        self.by_hash
            .get(hash)
            .is_some_and(|entry| entry.values().any(|v| *v))
    }

    /// Raw per-service flags for a hash.
    pub fn get(&self, hash: &str) -> Option<&HashMap<String, bool>> {
        self.by_hash.get(hash)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// Checks hashes against every configured acceleration service concurrently.
#[derive(Clone, Default)]
pub struct CacheResolver {
    services: Vec<Arc<dyn CacheService>>,
}

impl CacheResolver {
    pub fn new(services: Vec<Arc<dyn CacheService>>) -> Self {
        Self { services }
    }

    /// Build the configured service clients.
    pub fn from_config(entries: &[DebridConfig]) -> Result<Self, DebridError> {
        let mut services: Vec<Arc<dyn CacheService>> = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = entry.api_key.clone();
            let timeout = Duration::from_secs(entry.timeout_secs);
            let service: Arc<dyn CacheService> = match entry.service {
                DebridServiceKind::RealDebrid => Arc::new(RealDebrid::new(key, timeout)?),
                DebridServiceKind::Torbox => Arc::new(Torbox::new(key, timeout)?),
                DebridServiceKind::Premiumize => Arc::new(Premiumize::new(key, timeout)?),
                DebridServiceKind::AllDebrid => Arc::new(AllDebrid::new(key, timeout)?),
                DebridServiceKind::DebridLink => Arc::new(DebridLink::new(key, timeout)?),
            };
            services.push(service);
        }
        Ok(Self { services })
    }

    pub fn has_services(&self) -> bool {
        !self.services.is_empty()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name().to_string()).collect()
    }

    /// Look up a configured service by name (case-insensitive).
    pub fn service(&self, name: &str) -> Option<Arc<dyn CacheService>> {
        self.services
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Resolve availability for a set of canonical hashes.
    ///
    /// A service that fails outright contributes `false` for every hash; it
    /// never affects the other services or aborts the resolution.
    pub async fn resolve(&self, hashes: &[String]) -> CacheAvailability {
        let mut availability = CacheAvailability {
            services: self.service_names(),
            by_hash: HashMap::new(),
        };
        if hashes.is_empty() || self.services.is_empty() {
            return availability;
        }

        let checks = self.services.iter().map(|service| async move {
            let map = match service.check_cached_batch(hashes).await {
                Ok(found) => complete(found, hashes),
                Err(e) => {
                    warn!(
                        service = service.name(),
                        error = %e,
                        "Availability check failed, marking all hashes unavailable"
                    );
                    hashes.iter().map(|h| (h.clone(), false)).collect()
                }
            };
            (service.name().to_string(), map)
        });

        for (service, map) in join_all(checks).await {
            for (hash, cached) in map {
                availability
                    .by_hash
                    .entry(hash)
                    .or_default()
                    .insert(service.clone(), cached);
            }
        }

        let cached = hashes
            .iter()
            .filter(|h| availability.is_available(h))
            .count();
        info!(
            hashes = hashes.len(),
            cached = cached,
            services = self.services.len(),
            "Cache availability resolved"
        );
        availability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCacheService;

    fn hashes() -> Vec<String> {
        vec!["a".repeat(40), "b".repeat(40), "c".repeat(40)]
    }

    #[tokio::test]
    async fn test_merges_services_per_hash() {
        let rd = MockCacheService::new("RealDebrid");
        rd.set_cached(&["a".repeat(40), "b".repeat(40)]).await;
        let tb = MockCacheService::new("TorBox");
        tb.set_cached(&["b".repeat(40)]).await;

        let resolver = CacheResolver::new(vec![Arc::new(rd), Arc::new(tb)]);
        let availability = resolver.resolve(&hashes()).await;

        assert_eq!(availability.services_for(&"a".repeat(40)), vec!["RealDebrid"]);
        assert_eq!(
            availability.services_for(&"b".repeat(40)),
            vec!["RealDebrid", "TorBox"]
        );
        assert!(availability.services_for(&"c".repeat(40)).is_empty());
        assert!(!availability.is_available(&"c".repeat(40)));
        assert_eq!(availability.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_service_marks_false_and_isolated() {
        let good = MockCacheService::new("TorBox");
        good.set_cached(&["c".repeat(40)]).await;
        let bad = MockCacheService::new("RealDebrid");
        bad.set_error(DebridError::Timeout).await;

        let resolver = CacheResolver::new(vec![Arc::new(bad), Arc::new(good)]);
        let availability = resolver.resolve(&hashes()).await;

        for hash in hashes() {
            let flags = availability.get(&hash).unwrap();
            assert_eq!(flags.get("RealDebrid"), Some(&false));
            assert!(flags.contains_key("TorBox"));
        }
        assert_eq!(availability.services_for(&"c".repeat(40)), vec!["TorBox"]);
    }

    #[tokio::test]
    async fn test_no_services_is_empty() {
        let resolver = CacheResolver::default();
        assert!(!resolver.has_services());
        assert!(resolver.resolve(&hashes()).await.is_empty());
    }

    #[test]
    fn test_service_lookup_is_case_insensitive() {
        let resolver = CacheResolver::new(vec![Arc::new(MockCacheService::new("RealDebrid"))]);
        assert!(resolver.service("realdebrid").is_some());
        assert!(resolver.service("torbox").is_none());
    }

    #[test]
    fn test_from_config_builds_each_service() {
        let entries: Vec<DebridConfig> = [
            DebridServiceKind::RealDebrid,
            DebridServiceKind::Premiumize,
            DebridServiceKind::Torbox,
            DebridServiceKind::AllDebrid,
            DebridServiceKind::DebridLink,
        ]
        .into_iter()
        .map(|service| DebridConfig {
            service,
            api_key: "0123456789abcdef".to_string(),
            timeout_secs: 5,
        })
        .collect();
        let resolver = CacheResolver::from_config(&entries).unwrap();
        assert_eq!(
            resolver.service_names(),
            vec!["RealDebrid", "Premiumize", "TorBox", "AllDebrid", "DebridLink"]
        );
    }
}
