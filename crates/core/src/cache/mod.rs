//! Result memoization and in-flight request coalescing.

mod coalescer;
mod result_cache;

pub use coalescer::{CoalesceError, Coalescer};
pub use result_cache::{CacheStats, ResultCache};
