//! Cache-acceleration ("debrid") services.
//!
//! Each service implements [`CacheService`]. Availability checks run through a
//! [`FallbackChain`] of [`CheckStrategy`] steps, and the [`CacheResolver`]
//! merges the answers of every configured service per info hash.

pub mod alldebrid;
pub mod debridlink;
mod fallback;
mod http;
pub mod premiumize;
pub mod realdebrid;
mod resolver;
mod stremthru;
pub mod torbox;
mod types;

pub use alldebrid::AllDebrid;
pub use debridlink::DebridLink;
pub use fallback::{FallbackChain, SequentialBatches};
pub use premiumize::Premiumize;
pub use realdebrid::RealDebrid;
pub use resolver::{CacheAvailability, CacheResolver};
pub use stremthru::{StremThruCheck, DEFAULT_STREMTHRU_BASE};
pub use torbox::Torbox;
pub use types::*;
