//! Error types for the client.

use thiserror::Error;
use xplane_udp_protocol::CodecError;

/// Errors returned by [`XPlaneClient`](crate::XPlaneClient) operations.
#[derive(Debug, Error)]
pub enum XPlaneError {
    /// An outbound frame could not be encoded (usually a name that is too long).
    #[error("Frame encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// The handle was not produced by this client.
    #[error("Dataref handle {handle} out of range ({count} subscriptions)")]
    HandleOutOfRange {
        /// Raw handle index.
        handle: usize,
        /// Number of subscriptions known to the registry.
        count: usize,
    },

    /// Array subscriptions need at least one element.
    #[error("Invalid array length {0}")]
    InvalidArrayLength(usize),

    /// Frequencies are non-negative; zero stops a subscription.
    #[error("Invalid frequency {0}")]
    InvalidFrequency(i32),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The background session has been shut down.
    #[error("Session closed")]
    SessionClosed,

    /// Socket or thread setup failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl XPlaneError {
    /// Create a handle out of range error.
    #[must_use]
    pub fn handle_out_of_range(handle: usize, count: usize) -> Self {
        Self::HandleOutOfRange { handle, count }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }
}

/// A specialized `Result` type for client operations.
pub type XPlaneResult<T> = std::result::Result<T, XPlaneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XPlaneError::handle_out_of_range(7, 3);
        assert_eq!(
            err.to_string(),
            "Dataref handle 7 out of range (3 subscriptions)"
        );

        let err = XPlaneError::from(CodecError::buffer_too_small(413, 12));
        assert!(err.to_string().contains("413"));
    }

    #[test]
    fn test_error_constructors() {
        let err = XPlaneError::invalid_configuration("beacon_timeout_ms must be greater than 0");
        assert!(matches!(err, XPlaneError::InvalidConfiguration(_)));
    }
}
