use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Shortest accepted acceleration-service API key.
const MIN_DEBRID_KEY_LEN: usize = 10;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Search deadline and cache TTL are not 0
/// - Adapter names are non-empty and unique, enabled adapters have a URL
/// - Acceleration-service keys look like real keys
/// - Default preferences are within range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.search.timeout().is_zero() {
        return Err(ConfigError::ValidationError(
            "search.timeout_ms cannot be 0".to_string(),
        ));
    }

    if config.cache.ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "cache.ttl_secs cannot be 0".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for adapter in &config.adapters {
        if adapter.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "adapter name cannot be empty".to_string(),
            ));
        }
        if !seen.insert(adapter.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate adapter name: {}",
                adapter.name
            )));
        }
        if adapter.enabled && adapter.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "adapter {} is enabled but has no url",
                adapter.name
            )));
        }
    }

    for entry in &config.debrid {
        if entry.api_key.trim().len() < MIN_DEBRID_KEY_LEN {
            return Err(ConfigError::ValidationError(format!(
                "{} api key must be at least {} characters",
                entry.service.display_name(),
                MIN_DEBRID_KEY_LEN
            )));
        }
    }

    config
        .preferences
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    Ok(())
}
