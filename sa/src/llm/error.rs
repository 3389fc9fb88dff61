//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// The request itself was rejected (4xx other than rate limiting)
    pub fn is_client_error(&self) -> bool {
        matches!(self, LlmError::ApiError { status, .. } if (400..500).contains(status) && *status != 429)
    }

    /// The provider could not be reached or did not answer in time
    pub fn is_connectivity(&self) -> bool {
        match self {
            LlmError::Network(e) => !e.is_decode(),
            LlmError::Timeout(_) => true,
            _ => false,
        }
    }
}
