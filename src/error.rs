//! Error types for the coin fetcher

use thiserror::Error;

/// Errors that can occur when fetching data from a provider
///
/// The pollers treat every variant the same way: the cycle failed and will be
/// retried after the retry interval.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,
}

/// Errors returned by the fetcher's lifecycle operations
#[derive(Debug, Error)]
pub enum FetcherError {
    /// `start` was called while the pollers are already running
    #[error("Coin fetcher is already running")]
    AlreadyRunning,

    /// `start` was called after `stop`
    #[error("Coin fetcher has been stopped")]
    Stopped,

    /// The provider could not be constructed
    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),
}
