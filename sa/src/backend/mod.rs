//! Analytics backend - runs query text and returns flat records

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

mod log_analytics;

pub use log_analytics::LogAnalyticsBackend;

/// One result row: column name to value
pub type Record = Map<String, Value>;

/// Errors from the analytics backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Query failed ({status}): {message}")]
    Query { status: u16, message: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

/// Executes query text against the analytics store
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn run_query(&self, query: &str) -> Result<Vec<Record>, BackendError>;
}
