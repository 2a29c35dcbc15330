//! Venue-agnostic error type returned through [`crate::VenueClient`].

use thiserror::Error;

/// Errors returned by a venue client.
///
/// Concrete venue crates convert their own error types into this one so the
/// engine can log and classify failures without knowing the transport.
#[derive(Debug, Error)]
pub enum VenueError {
    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Rate limit exceeded.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimit {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Non-success response from the venue API.
    #[error("API error {status_code}: {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error message from the venue.
        message: String,
    },

    /// Credentials missing, malformed, or refused.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// The venue refused to accept or cancel an order.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// The venue does not know the order.
    #[error("order not found: {order_id}")]
    OrderNotFound {
        /// Order identifier that was looked up.
        order_id: String,
    },

    /// Streaming connection is not established.
    #[error("not connected")]
    NotConnected,

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Client was built with invalid settings or input.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl VenueError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates an API error.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Creates an order rejection.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::OrderRejected(msg.into())
    }

    /// Creates an order-not-found error.
    pub fn order_not_found(order_id: impl Into<String>) -> Self {
        Self::OrderNotFound {
            order_id: order_id.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns true if the same call may succeed on a later cycle.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimit { .. } | Self::NotConnected => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Suggested wait before retrying, if the venue provided one.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimit { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Result alias for venue operations.
pub type VenueResult<T> = std::result::Result<T, VenueError>;
