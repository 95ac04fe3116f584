use chrono::{DateTime, Utc};
use std::sync::Arc;
use yarr_core::{Config, SanitizedConfig, StreamResolver};

/// Shared application state
pub struct AppState {
    config: Config,
    resolver: Arc<StreamResolver>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, resolver: Arc<StreamResolver>) -> Self {
        Self {
            config,
            resolver,
            started_at: Utc::now(),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn resolver(&self) -> &Arc<StreamResolver> {
        &self.resolver
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
