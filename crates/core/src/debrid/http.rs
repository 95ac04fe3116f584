//! HTTP plumbing shared by the service clients.

use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

use super::types::DebridError;

/// Error code RealDebrid uses for endpoints it has switched off.
const DISABLED_ENDPOINT_CODE: i64 = 37;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, DebridError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DebridError::ConnectionFailed(format!("HTTP client: {}", e)))
}

/// Pass successful responses through; turn everything else into a typed error.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, DebridError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();
    let code = parsed.as_ref().and_then(|b| b.error_code);
    let message = parsed
        .and_then(|b| b.error)
        .unwrap_or_else(|| body.chars().take(200).collect());

    if code == Some(DISABLED_ENDPOINT_CODE) || message == "disabled_endpoint" {
        return Err(DebridError::DisabledEndpoint(message));
    }

    Err(DebridError::Http {
        status: status.as_u16(),
        code,
        message,
    })
}

/// Whether a file name looks like a playable video.
pub(crate) fn is_video_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    [".mkv", ".mp4", ".avi"].iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file("Movie.2020.1080p.MKV"));
        assert!(is_video_file("a/b/c.mp4"));
        assert!(!is_video_file("sample.txt"));
        assert!(!is_video_file("movie.mkv.nfo"));
    }
}
