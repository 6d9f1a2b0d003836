//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] rfidlink_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] rfidlink_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] rfidlink_types::Error),

    #[error("Reader not connected")]
    NotConnected,

    #[error("Invalid response from module: {0}")]
    InvalidResponse(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Check if the session is lost and must be restarted
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Core(e) => e.is_fatal(),
            Self::Transport(e) => e.is_fatal(),
            Self::NotConnected => true,
            _ => false,
        }
    }

    /// Module status word, if the module rejected the command
    pub fn module_status(&self) -> Option<u16> {
        match self {
            Self::Core(rfidlink_core::Error::ModuleError { status, .. }) => Some(*status),
            _ => None,
        }
    }
}
