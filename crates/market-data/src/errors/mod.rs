//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the caller should handle the error.
///
/// Note that "no data for the requested range" is not an error: providers
/// return an empty row set for it.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The requested symbol is unknown to the provider.
    /// This is a terminal error - retrying won't help.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider does not implement the requested operation.
    #[error("{provider} does not support {operation}")]
    NotSupported {
        /// The provider that was asked
        provider: String,
        /// Operation name, e.g. "list_symbols"
        operation: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider answered with a 5xx status.
    #[error("Server error from {provider}: HTTP {status}")]
    ServerError {
        /// The provider that failed
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// The provider could not be reached at all (DNS, refused connection).
    #[error("{provider} unreachable: {message}")]
    Unreachable {
        /// The provider that could not be reached
        provider: String,
        /// Underlying transport message
        message: String,
    },

    /// The provider rejected our credentials or blocked the client (401/403).
    #[error("{provider} refused access: {message}")]
    Unauthorized {
        /// The provider that refused access
        provider: String,
        /// Status or provider message
        message: String,
    },

    /// A provider-specific error occurred.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider answered, but the payload could not be parsed.
    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse {
        /// The provider that returned the payload
        provider: String,
        /// Parser message
        message: String,
    },

    /// The circuit breaker is open for this provider.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::Never`]: Don't retry, the error is terminal
    /// - [`RetryClass::WithBackoff`]: Retry with exponential backoff
    /// - [`RetryClass::CircuitOpen`]: Provider circuit is open, fail fast
    ///
    /// # Examples
    ///
    /// ```
    /// use stockbase_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "TWSE".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::SymbolNotFound(_)
            | Self::NotSupported { .. }
            | Self::Unauthorized { .. }
            | Self::ProviderError { .. }
            | Self::MalformedResponse { .. } => RetryClass::Never,

            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::ServerError { .. }
            | Self::Unreachable { .. }
            | Self::Network(_) => RetryClass::WithBackoff,

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,
        }
    }

    /// Whether the error means the source itself could not be used,
    /// as opposed to a problem with one particular request.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::ServerError { .. }
                | Self::Unreachable { .. }
                | Self::Unauthorized { .. }
                | Self::CircuitOpen { .. }
                | Self::Network(_)
        )
    }

    /// Map a transport error from reqwest into the matching variant.
    pub fn from_transport(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
            }
        } else if err.is_connect() {
            Self::Unreachable {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Network(err)
        }
    }
}
