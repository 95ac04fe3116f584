//! Stream resolution: search, dedup, rank, filter, acceleration lookup.

mod resolver;
mod stats;
mod types;

pub use resolver::{apply_cache_filter, cap_per_tier, ResolverSettings, StreamResolver};
pub use stats::{format_size, StreamStatistics};
pub use types::{
    CacheFilter, ContentKind, PipelineError, Preferences, ResolutionStats, ResolvedStream,
    StreamRequest, StreamResolution, MAX_PER_QUALITY_RANGE,
};
