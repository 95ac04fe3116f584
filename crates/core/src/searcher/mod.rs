//! Multi-source search.
//!
//! This module provides the `SourceAdapter` contract, the adapter registry,
//! provider health tracking, the deadline-bounded fan-out orchestrator and
//! cross-adapter deduplication.

mod dedup;
mod health;
mod magnet;
mod orchestrator;
mod registry;
mod torznab;
mod trackers;
mod types;

pub use dedup::{dedupe, dedupe_grouped, distinct_hashes, DedupGroup, DedupStrategy};
pub use health::{
    HealthConfig, HealthDashboard, HealthStatus, ProviderHealthMonitor, ProviderHealthRecord,
};
pub use magnet::{
    announce_urls, build_magnet, enrich_magnet, info_hash_from_magnet, normalize_info_hash,
};
pub use orchestrator::{AdapterOutcome, AdapterReport, SearchOrchestrator, SearchReport};
pub use registry::AdapterRegistry;
pub use torznab::TorznabAdapter;
pub use trackers::{TrackerFamily, TrackerLists};
pub use types::*;
