//! Error types for the Coinbase integration.
//!
//! [`CoinbaseError`] carries transport and signing detail; it is converted
//! into the venue-agnostic [`VenueError`] at the [`VenueClient`] boundary.
//!
//! [`VenueClient`]: basis_trade_core::VenueClient

use basis_trade_core::VenueError;
use thiserror::Error;

/// Errors that can occur when talking to Coinbase.
#[derive(Debug, Error)]
pub enum CoinbaseError {
    /// Credentials missing or refused.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Request or token signing failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// API request failed.
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds to wait before retry.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Invalid request parameters, rejected before sending.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Order rejected by the exchange.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Order not found.
    #[error("order not found: {order_id}")]
    OrderNotFound {
        /// The order ID that was not found.
        order_id: String,
    },

    /// WebSocket failure.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// WebSocket is not connected.
    #[error("websocket not connected")]
    NotConnected,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CoinbaseError {
    /// Creates an API error from status code and message.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a rate limit error.
    pub fn rate_limit(retry_after_secs: u64) -> Self {
        Self::RateLimit { retry_after_secs }
    }

    /// Creates an order not found error.
    pub fn order_not_found(order_id: impl Into<String>) -> Self {
        Self::OrderNotFound {
            order_id: order_id.into(),
        }
    }

    /// Returns true if the error indicates the request should be retried later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } | Self::WebSocket(_) => {
                true
            }
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CoinbaseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::Serialization(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CoinbaseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CoinbaseError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<CoinbaseError> for VenueError {
    fn from(err: CoinbaseError) -> Self {
        match err {
            CoinbaseError::Authentication(msg) | CoinbaseError::Signing(msg) => {
                Self::Authentication(msg)
            }
            CoinbaseError::Api {
                status_code,
                message,
            } => Self::Api {
                status_code,
                message,
            },
            CoinbaseError::RateLimit { retry_after_secs } => Self::RateLimit { retry_after_secs },
            CoinbaseError::Network(msg) | CoinbaseError::WebSocket(msg) => Self::Network(msg),
            CoinbaseError::Timeout(msg) => Self::Timeout(msg),
            CoinbaseError::InvalidRequest(msg) | CoinbaseError::Configuration(msg) => {
                Self::Configuration(msg)
            }
            CoinbaseError::OrderRejected(msg) => Self::OrderRejected(msg),
            CoinbaseError::OrderNotFound { order_id } => Self::OrderNotFound { order_id },
            CoinbaseError::NotConnected => Self::NotConnected,
            CoinbaseError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

/// Result type alias for Coinbase operations.
pub type Result<T> = std::result::Result<T, CoinbaseError>;
