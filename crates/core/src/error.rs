//! Error types for the Glimpse domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Backends speak `ProviderError`; the capability layer turns those into
//! in-band values before they reach the pipeline.

use thiserror::Error;

/// Errors from core operations that touch the filesystem or caller input.
#[derive(Debug, Error)]
pub enum Error {
    // --- Caller input ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Filesystem ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures a backend can report for a single request.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider returned no content")]
    EmptyResponse,
}

impl ProviderError {
    /// Map a non-success HTTP status to the matching variant.
    pub fn from_status(status_code: u16, body: String) -> Self {
        match status_code {
            429 => Self::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => Self::AuthenticationFailed(if body.is_empty() {
                "Invalid API key or insufficient permissions".into()
            } else {
                body
            }),
            404 => Self::ModelNotFound(body),
            _ => Self::ApiError {
                status_code,
                message: body,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 500,
            message: "upstream exploded".into(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            ProviderError::from_status(429, String::new()),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            ProviderError::from_status(401, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            ProviderError::from_status(403, "nope".into()),
            ProviderError::AuthenticationFailed(ref m) if m == "nope"
        ));
        assert!(matches!(
            ProviderError::from_status(404, "no such model".into()),
            ProviderError::ModelNotFound(_)
        ));
        assert!(matches!(
            ProviderError::from_status(502, "bad gateway".into()),
            ProviderError::ApiError { status_code: 502, .. }
        ));
    }
}
