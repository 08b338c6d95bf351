//! Unified error types for pcmconv

use thiserror::Error;

/// Main error type for conversion operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvError {
    /// Operation attempted before the chain was configured for it
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// Spec pair or rate pair the converters cannot handle
    #[error("Unsupported conversion: {0}")]
    UnsupportedConversion(String),

    /// Buffer or resampling context allocation failed
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Error reported by the upstream frame source, passed through as-is
    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),

    /// Frame source has no more frames to hand out
    #[error("Frame source exhausted")]
    EndOfStream,

    /// Caller-supplied destination is shorter than the converted data
    #[error("Destination buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Result type alias for conversion operations
pub type Result<T> = std::result::Result<T, ConvError>;

impl ConvError {
    /// Create an unsupported-conversion error with context
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedConversion(message.into())
    }

    /// Create an upstream error with context
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamFailure(message.into())
    }

    /// Whether the stream must be reconfigured before it is used again
    ///
    /// A failed pull leaves the carry buffer partially filled, so anything
    /// other than a caller-side sizing problem or a clean end of stream
    /// means the chain state can no longer be trusted.
    pub fn requires_reconfigure(&self) -> bool {
        !matches!(
            self,
            ConvError::BufferTooSmall { .. } | ConvError::EndOfStream
        )
    }
}

impl From<std::collections::TryReserveError> for ConvError {
    fn from(e: std::collections::TryReserveError) -> Self {
        ConvError::OutOfMemory(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_errors_do_not_break_the_stream() {
        let small = ConvError::BufferTooSmall {
            needed: 8,
            available: 4,
        };
        assert!(!small.requires_reconfigure());
        assert!(!ConvError::EndOfStream.requires_reconfigure());
        assert!(ConvError::upstream("device gone").requires_reconfigure());
        assert!(ConvError::InvalidState("not configured").requires_reconfigure());
    }

    #[test]
    fn test_messages_carry_context() {
        let e = ConvError::unsupported("44100Hz -> 12345Hz");
        assert_eq!(e.to_string(), "Unsupported conversion: 44100Hz -> 12345Hz");
    }
}
