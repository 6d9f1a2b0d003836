//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unexpected write: {0}")]
    UnexpectedWrite(String),
}

impl Error {
    /// Check if the link is gone and the session must be restarted
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NotConnected | Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(!Error::Io(io::Error::from(io::ErrorKind::Interrupted)).is_fatal());
        assert!(!Error::Serial("framing error".into()).is_fatal());
    }
}
