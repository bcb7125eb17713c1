//! Error types for hydra-llm

use thiserror::Error;

/// Proxy error type
#[derive(Debug, Error)]
pub enum Error {
    /// Request body was not valid JSON or is missing a required field
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No configured model can take the request
    #[error("No available models for this request length")]
    NoEligibleModel,

    /// Model name not present in the catalog
    #[error("specified model not found: {0}")]
    UnknownModel(String),

    /// Upstream returned a non-200 status
    #[error("upstream status {status}: {body}")]
    UpstreamStatus {
        /// HTTP status code from the provider
        status: u16,
        /// Response body, kept for logging
        body: String,
    },

    /// Upstream reply decoded to an empty message
    #[error("no content in upstream reply")]
    NoContent,

    /// Reply too short to be an image
    #[error("small response length: {0}")]
    SmallBody(usize),

    /// Upstream reply could not be decoded
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// OAuth token exchange failed
    #[error("oauth error: {0}")]
    OAuth(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
