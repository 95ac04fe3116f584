pub mod handlers;
pub mod middleware;
pub mod providers;
pub mod routes;
pub mod streams;

pub use routes::create_router;

use serde::Serialize;

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
