//! Traits describing the pricing backend and its error type.

use async_trait::async_trait;

use crate::model::{Location, OptionId, PricingOption};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors that can occur while talking to the pricing backend.
///
/// The type is `Clone` so one failed fetch can be handed to every caller that
/// was waiting on it.
pub enum GatewayError {
    /// The service answered with a non-success status.
    #[error("{message} (status {status})")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Message reported by the service, or a generic one.
        message: String,
        /// Undecoded response body.
        raw_body: String,
    },
    /// No HTTP response was received.
    #[error("Network error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
    /// Postcode or area is blank.
    #[error("Invalid location: postcode and area must not be empty")]
    InvalidLocation,
    /// Internal error, e.g. a fetch task that did not complete.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status of the failure; `0` when no HTTP response was received.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Remote { status, .. } => *status,
            _ => 0,
        }
    }

    /// Whether repeating the request could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Remote { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            GatewayError::Transport { .. } | GatewayError::Internal(_) => true,
            GatewayError::Parse(_) | GatewayError::InvalidLocation => false,
        }
    }
}

#[async_trait]
/// Backend that knows the skip prices for a location.
pub trait PricingPort: Send + Sync {
    /// Fetch every pricing option offered at `location`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the request fails or the service rejects it.
    async fn pricing_options(&self, location: &Location) -> Result<Vec<PricingOption>, GatewayError>;

    /// Fetch a single pricing option by identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the request fails or the body is not an option.
    async fn pricing_option(&self, id: OptionId) -> Result<PricingOption, GatewayError>;
}
