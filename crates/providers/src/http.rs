//! HTTP plumbing shared by the backends: client construction, status
//! mapping, and SSE line splitting.

use std::time::Duration;

use glimpse_core::error::ProviderError;
use tracing::warn;

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Build a client with the given request timeout.
pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Fail before any I/O when a backend that needs a key has none.
pub(crate) fn require_key(provider: &str, api_key: &str) -> Result<(), ProviderError> {
    if api_key.trim().is_empty() {
        return Err(ProviderError::NotConfigured(format!(
            "no API key for {provider}"
        )));
    }
    Ok(())
}

/// Map a transport failure.
pub(crate) fn send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Turn a non-success response into a `ProviderError`, consuming the body.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(provider, status, body = %body, "Provider API error");
    Err(ProviderError::from_status(status, body))
}

/// Accumulates raw bytes and yields complete lines, as SSE arrives in
/// arbitrary fragments.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line without its terminator. Only whole lines are
    /// decoded, so a character split across fragments survives.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        let line_end = self.buffer.iter().position(|&b| b == b'\n')?;
        let line = String::from_utf8_lossy(&self.buffer[..line_end])
            .trim_end_matches('\r')
            .to_string();
        self.buffer.drain(..=line_end);
        Some(line)
    }
}

/// The payload of an SSE `data:` line.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim).filter(|d| !d.is_empty())
}
