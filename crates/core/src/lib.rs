pub mod cache;
pub mod config;
pub mod debrid;
pub mod filter;
pub mod metrics;
pub mod pipeline;
pub mod ranking;
pub mod searcher;
pub mod testing;

pub use cache::{CacheStats, CoalesceError, Coalescer, ResultCache};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use debrid::{CacheAvailability, CacheResolver, CacheService, DebridError, DebridServiceKind};
pub use filter::{FilterConstraints, FilterPipeline, FilterStats, Predicate};
pub use pipeline::{
    CacheFilter, ContentKind, PipelineError, Preferences, ResolvedStream, StreamRequest,
    StreamResolution, StreamResolver,
};
pub use ranking::{Ranker, ScoreTable, ScoredResult, SortMode};
pub use searcher::{
    AdapterError, AdapterRegistry, HealthConfig, ProviderHealthMonitor, RawResult, SearchOrchestrator,
    SearchQuery, SourceAdapter,
};
