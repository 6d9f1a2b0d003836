//! Error types for rfidlink-core

use std::time::Duration;

use crate::frame::Corruption;

/// Result type alias for rfidlink-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No terminal response arrived before the deadline
    #[error("Timeout waiting for response to opcode 0x{opcode:02X} after {}ms", timeout.as_millis())]
    CommandTimeout {
        opcode: u8,
        timeout: Duration,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Frame failed validation for a reason other than its checksum
    #[error("Corrupt frame: {0}")]
    Corrupt(Corruption),

    /// Module answered with a non-zero status word
    #[error("Module reported status 0x{status:04X} for opcode 0x{opcode:02X}")]
    ModuleError {
        opcode: u8,
        status: u16,
    },

    /// Too many bytes discarded without producing a frame
    #[error("Stream desynchronized: {discarded} bytes discarded without a valid frame")]
    StreamDesynchronized {
        discarded: usize,
    },

    /// Tag report payload does not have the expected layout
    #[error("Malformed tag report: {0}")]
    WrongShape(String),

    /// Payload too large for a single frame
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// Operation not allowed in the current session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Unknown opcode
    #[error("Unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),
}

impl Error {
    /// Check if error is recoverable (retry might succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CommandTimeout { .. }
                | Self::ChecksumMismatch { .. }
                | Self::Corrupt(_)
                | Self::WrongShape(_)
        )
    }

    /// Check if error ends the current session
    ///
    /// Buffered stream state cannot be trusted after these; the caller has to
    /// restart the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StreamDesynchronized { .. })
    }
}

impl From<Corruption> for Error {
    fn from(corruption: Corruption) -> Self {
        match corruption {
            Corruption::ChecksumMismatch { expected, received, .. } => {
                Self::ChecksumMismatch { expected, received }
            }
            other => Self::Corrupt(other),
        }
    }
}
