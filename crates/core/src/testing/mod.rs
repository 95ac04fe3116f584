//! Testing utilities and mock implementations.
//!
//! Mocks for the two external seams (source adapters and acceleration
//! services), so the whole resolution pipeline can run without indexers or
//! debrid accounts.
//!
//! # Example
//!
//! ```rust,ignore
//! use yarr_core::testing::{fixtures, MockAdapter, MockCacheService};
//!
//! let adapter = MockAdapter::new("jackett");
//! adapter.set_results(vec![fixtures::raw_result("jackett", "Movie.2020.1080p.WEB-DL", 1)]).await;
//!
//! let rd = MockCacheService::new("RealDebrid");
//! rd.set_cached(&[fixtures::info_hash(1)]).await;
//! ```

mod mock_adapter;
mod mock_cache_service;

pub use mock_adapter::MockAdapter;
pub use mock_cache_service::MockCacheService;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::searcher::RawResult;

    /// Deterministic 40-hex info hash for a seed.
    pub fn info_hash(seed: u64) -> String {
        format!("{:040x}", seed)
    }

    /// A magnet-backed result with reasonable defaults.
    ///
    /// Distinct seeds give distinct hashes and sizes at least 250 MB apart.
    pub fn raw_result(tracker: &str, name: &str, seed: u64) -> RawResult {
        let hash = info_hash(seed);
        RawResult {
            name: name.to_string(),
            tracker: tracker.to_string(),
            category: None,
            size_bytes: Some(1_000_000_000 + seed * 250_000_000),
            seeders: Some(50),
            peers: Some(10),
            download_uri: format!("magnet:?xt=urn:btih:{}", hash),
            info_hash: Some(hash),
        }
    }

    /// A result that only has a .torrent URL and no hash.
    pub fn torrent_url_result(tracker: &str, name: &str) -> RawResult {
        RawResult {
            name: name.to_string(),
            tracker: tracker.to_string(),
            category: None,
            size_bytes: None,
            seeders: Some(5),
            peers: None,
            download_uri: format!("https://indexer.example/dl/{}.torrent", name),
            info_hash: None,
        }
    }
}
