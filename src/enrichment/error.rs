//! Error types for the enrichment client.

use thiserror::Error;

/// Why a single enrichment attempt produced no result.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// No credential configured
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection failed, timed out or the body could not be read
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 429 from the service
    #[error("Rate limited by enrichment service")]
    RateLimited,

    /// Any other non-2xx response
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response did not contain a usable structured payload
    #[error("Parse error: {0}")]
    Parse(String),
}

impl EnrichError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnrichError::Network(_) | EnrichError::RateLimited)
    }
}
