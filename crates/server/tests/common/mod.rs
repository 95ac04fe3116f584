//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process with
//! mock source adapters and a mock acceleration service, so the HTTP surface
//! can be exercised without indexers or debrid accounts.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use yarr_core::{
    pipeline::ResolverSettings,
    ranking::ScoreTable,
    testing::{MockAdapter, MockCacheService},
    AdapterRegistry, CacheResolver, Config, HealthConfig, ProviderHealthMonitor, Ranker,
    SearchOrchestrator, StreamResolver,
};
use yarr_server::state::AppState;

/// Re-export fixtures for test convenience
pub use yarr_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_streams() {
///     let fixture = TestFixture::new(&["jackett"]);
///     fixture.adapter(0).set_results(vec![fixtures::raw_result("jackett", "Movie.1080p", 1)]).await;
///
///     let response = fixture.post("/api/v1/streams", json!({
///         "kind": "movie", "media_id": "tt1", "title": "Movie"
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Registered mock adapters, in registration order
    pub adapters: Vec<MockAdapter>,
    /// Mock acceleration service, registered as "RealDebrid"
    pub debrid: MockCacheService,
    /// The resolver behind the router
    pub resolver: Arc<StreamResolver>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with one mock adapter per name.
    pub fn new(adapter_names: &[&str]) -> Self {
        let adapters: Vec<MockAdapter> =
            adapter_names.iter().map(|n| MockAdapter::new(*n)).collect();
        let mut registry = AdapterRegistry::new();
        for adapter in &adapters {
            registry.register(Arc::new(adapter.clone()));
        }

        let debrid = MockCacheService::new("RealDebrid");
        let health = Arc::new(ProviderHealthMonitor::new(HealthConfig::default()));
        let resolver = Arc::new(StreamResolver::new(
            SearchOrchestrator::new(Arc::new(registry), health),
            Ranker::new(ScoreTable::default()),
            CacheResolver::new(vec![Arc::new(debrid.clone())]),
            ResolverSettings::default(),
        ));

        let state = Arc::new(AppState::new(Config::default(), Arc::clone(&resolver)));
        let router = yarr_server::api::create_router(state);

        Self {
            router,
            adapters,
            debrid,
            resolver,
        }
    }

    pub fn adapter(&self, index: usize) -> &MockAdapter {
        &self.adapters[index]
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// GET a path and return the raw text body (for non-JSON endpoints).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
