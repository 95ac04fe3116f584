//! HTTP surface and process wiring for the yarr stream resolver.
//!
//! The binary in `main.rs` owns bootstrap; this library exposes the router,
//! state and metrics so integration tests can drive them in-process.

pub mod api;
pub mod metrics;
pub mod state;
