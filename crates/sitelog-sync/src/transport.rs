//! Contract for the backend HTTP collaborator.

use async_trait::async_trait;
use serde_json::Value;
use sitelog_core::ApiResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("session expired (401); credentials cleared")]
    Unauthorized,
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Single-shot calls against the backend. Implementations own timeouts,
/// header injection, and clearing credentials on 401.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError>;
    async fn post(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError>;
    async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, TransportError>;
}
