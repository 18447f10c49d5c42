//! Error types for the reach protocol stack.
//!
//! Two layers of errors exist:
//!
//! - [`FrameError`] describes why a single candidate frame could not be decoded.
//!   These are recovered locally by [`decode_many`](crate::protocol::decode_many),
//!   which drops the offending frame and keeps going.
//! - [`ReachError`] is returned from the public API: transport failures on send,
//!   invalid packet construction, configuration problems and timeouts.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use reach::ReachError;
//!
//! let error = ReachError::transport_error("write", std::io::Error::other("link down"));
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::types::PacketId;

/// Result type alias for reach operations.
pub type Result<T, E = ReachError> = std::result::Result<T, E>;

/// Failure to decode one candidate frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Checksum mismatch: expected {expected:#04x}, found {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Length mismatch: frame declares {declared} bytes, found {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Frame truncated: {len} bytes is too short")]
    Truncated { len: usize },

    #[error("Byte unstuffing failed at offset {position}")]
    Unstuffing { position: usize },
}

/// Main error type for reach operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReachError {
    #[error("Frame decode failed: {0}")]
    Frame(#[from] FrameError),

    #[error("Transport {operation} failed")]
    Transport {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create a {packet_id} packet with an empty payload")]
    EmptyPayload { packet_id: PacketId },

    #[error("Payload of {len} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Payload size mismatch: expected {expected} bytes, found {found}")]
    PayloadSize { expected: usize, found: usize },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },
}

impl ReachError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReachError::Transport { .. } => true,
            ReachError::Timeout { .. } => true,
            ReachError::Frame(_) => true,
            ReachError::EmptyPayload { .. } => false,
            ReachError::PayloadTooLarge { .. } => false,
            ReachError::PayloadSize { .. } => false,
            ReachError::Config { .. } => false,
            ReachError::Parse { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ReachError::Frame(_) => vec![
                "Check for electrical noise on the serial line",
                "Verify the device baud rate matches the port configuration",
                "Wait for the next frame; corrupt frames are skipped",
            ],
            ReachError::Transport { .. } => vec![
                "Check the device is powered and connected",
                "Verify read/write permissions on the serial port",
                "Verify the device IP address and port",
                "Retry once the link is restored",
            ],
            ReachError::EmptyPayload { .. } => vec![
                "Provide at least one payload byte",
                "Use request() for read requests instead of an empty packet",
            ],
            ReachError::PayloadTooLarge { .. } => vec![
                "Split the data across several packets",
                "Check the payload was built for the right packet type",
            ],
            ReachError::PayloadSize { .. } => vec![
                "Check the packet type carries the value type being decoded",
                "Inspect the raw payload bytes",
            ],
            ReachError::Timeout { .. } => vec![
                "Increase the timeout duration",
                "Verify the device is responding to heartbeat requests",
                "Check the transport is connected to the right endpoint",
            ],
            ReachError::Config { .. } => vec![
                "Use non-zero queue size, worker count and timeout",
                "Start from DriverConfig::default()",
            ],
            ReachError::Parse { .. } => vec![
                "Check the configuration file syntax",
                "Verify field names and value types",
            ],
        }
    }

    /// Helper constructor for transport errors with the failing operation.
    pub fn transport_error(operation: impl Into<String>, source: std::io::Error) -> Self {
        ReachError::Transport { operation: operation.into(), source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        ReachError::Config { reason: reason.into() }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        ReachError::Parse { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for ReachError {
    fn from(err: std::io::Error) -> Self {
        ReachError::Transport { operation: "<unknown>".to_string(), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                operation in "\\w+",
                reason in ".*",
                expected in any::<u8>(),
                actual in any::<u8>(),
                declared in 0usize..260,
            ) {
                let transport = ReachError::transport_error(
                    operation.clone(),
                    std::io::Error::other("boom"),
                );
                prop_assert!(transport.to_string().contains(&operation));

                let config = ReachError::config_error(reason.clone());
                prop_assert!(config.to_string().contains(&reason));

                let checksum = FrameError::ChecksumMismatch { expected, actual };
                let msg = checksum.to_string();
                let expected_hex = format!("{:#04x}", expected);
                prop_assert!(msg.contains(&expected_hex));

                let length = FrameError::LengthMismatch { declared, actual: declared + 1 };
                prop_assert!(length.to_string().contains(&declared.to_string()));
            }
        }
    }

    #[test]
    fn transport_error_preserves_source() {
        let err = ReachError::transport_error("read", std::io::Error::other("unplugged"));
        let source = std::error::Error::source(&err).expect("transport error has a source");
        assert_eq!(source.to_string(), "unplugged");
    }

    #[test]
    fn frame_errors_convert_into_reach_errors() {
        let err: ReachError = FrameError::Truncated { len: 2 }.into();
        assert!(matches!(err, ReachError::Frame(FrameError::Truncated { len: 2 })));
        assert!(err.is_retryable());
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<ReachError>();
        assert_send_sync_static::<FrameError>();
    }

    #[test]
    fn recovery_methods_work() {
        let transport = ReachError::transport_error("write", std::io::Error::other("x"));
        let empty = ReachError::EmptyPayload { packet_id: PacketId::POSITION };
        let timeout = ReachError::Timeout { duration: Duration::from_secs(1) };

        assert!(transport.is_retryable());
        assert!(timeout.is_retryable());
        assert!(!empty.is_retryable());

        for error in [&transport, &empty, &timeout] {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn empty_payload_message_names_packet() {
        let err = ReachError::EmptyPayload { packet_id: PacketId::POSITION };
        assert!(err.to_string().contains("POSITION"));
    }
}
