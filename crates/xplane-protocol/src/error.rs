//! Codec error types.

use thiserror::Error;

/// Errors produced while building or parsing frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The destination buffer cannot hold the next field.
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required up to and including the failing field.
        needed: usize,
        /// Bytes available in the destination.
        available: usize,
    },

    /// The frame ends before all expected fields were read.
    #[error("Truncated frame: need {needed} bytes, got {available}")]
    TruncatedFrame {
        /// Bytes required up to and including the failing field.
        needed: usize,
        /// Bytes present in the frame.
        available: usize,
    },

    /// The frame does not start with the expected tag.
    #[error("Unexpected frame tag {found:?}, expected {expected}")]
    UnexpectedTag {
        /// Tag the parser was asked to handle.
        expected: &'static str,
        /// First bytes of the received frame (lossy).
        found: String,
    },

    /// The frame length does not match the layout of its tag.
    #[error("Invalid {frame} frame length: {len} bytes")]
    InvalidLength {
        /// Frame name.
        frame: &'static str,
        /// Received length.
        len: usize,
    },
}

impl CodecError {
    /// Create a buffer too small error.
    #[must_use]
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Self::BufferTooSmall { needed, available }
    }

    /// Create a truncated frame error.
    #[must_use]
    pub fn truncated(needed: usize, available: usize) -> Self {
        Self::TruncatedFrame { needed, available }
    }

    /// Create an invalid length error.
    #[must_use]
    pub fn invalid_length(frame: &'static str, len: usize) -> Self {
        Self::InvalidLength { frame, len }
    }

    pub(crate) fn unexpected_tag(expected: &'static str, data: &[u8]) -> Self {
        let found = data.get(..4).unwrap_or(data);
        Self::UnexpectedTag {
            expected,
            found: String::from_utf8_lossy(found).into_owned(),
        }
    }
}

/// A specialized `Result` type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodecError::buffer_too_small(413, 100);
        assert_eq!(err.to_string(), "Buffer too small: need 413 bytes, have 100");

        let err = CodecError::truncated(21, 9);
        assert!(err.to_string().contains("21"));
    }

    #[test]
    fn test_unexpected_tag_is_lossy() {
        let err = CodecError::unexpected_tag("BECN", b"RREF\0\x01\x02");
        assert!(matches!(
            err,
            CodecError::UnexpectedTag { ref found, .. } if found == "RREF"
        ));
    }
}
