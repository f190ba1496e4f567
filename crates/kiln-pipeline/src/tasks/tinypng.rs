//! TinyPNG client.
//!
//! Uploads the image to the shrink endpoint, then downloads the compressed
//! result from the URL the service returns. No retries.

use std::time::Duration;

use super::TaskError;

const SHRINK_URL: &str = "https://api.tinify.com/shrink";
const TIMEOUT_SECONDS: u64 = 60;

fn remote(e: impl std::fmt::Display) -> TaskError {
    TaskError::Remote(e.to_string())
}

/// Pull the compressed image URL out of a shrink response body.
pub fn output_url(body: &serde_json::Value) -> Option<&str> {
    body.get("output")?.get("url")?.as_str()
}

/// Compress `bytes` with the TinyPNG API.
pub fn shrink(key: &str, bytes: &[u8]) -> Result<Vec<u8>, TaskError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECONDS))
        .build()
        .map_err(remote)?;

    let body: serde_json::Value = client
        .post(SHRINK_URL)
        .basic_auth("api", Some(key))
        .body(bytes.to_vec())
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(remote)?
        .json()
        .map_err(remote)?;

    let url = output_url(&body)
        .ok_or_else(|| TaskError::Remote("response has no output url".to_string()))?;

    let compressed = client
        .get(url)
        .basic_auth("api", Some(key))
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(remote)?
        .bytes()
        .map_err(remote)?;

    tracing::debug!(
        "TinyPNG shrank {} bytes to {}",
        bytes.len(),
        compressed.len()
    );
    Ok(compressed.to_vec())
}
