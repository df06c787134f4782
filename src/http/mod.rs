//! # HTTP Adapters
//!
//! `reqwest`-backed implementations of the platform ports, used when the
//! runtime runs headless against a live backend.
//!
//! - **sse**: push-streams over Server-Sent Events
//! - **upload**: multipart voice uploads
//! - **console**: a host page that renders to the log and polls with tokio timers

pub mod console;
pub mod sse;
pub mod upload;

pub use console::ConsoleHost;
pub use sse::SsePushSource;
pub use upload::HttpUploader;

use crate::error::{RuntimeError, RuntimeResult};
use reqwest::header::HeaderMap;
use reqwest::Url;

/// Response header naming the stream that carries a chat reply.
pub const STREAM_URL_HEADER: &str = "x-stream-url";

/// The reply stream URL announced by a chat post response, if any.
pub fn stream_url_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(STREAM_URL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolve an endpoint path (or an absolute URL) against the server base URL.
pub fn resolve_url(base_url: &str, path: &str) -> RuntimeResult<Url> {
    let base = Url::parse(base_url)
        .map_err(|e| RuntimeError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;
    base.join(path)
        .map_err(|e| RuntimeError::Config(format!("invalid path '{}': {}", path, e)))
}
