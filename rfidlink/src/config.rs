//! Reader configuration

use std::time::Duration;

use rfidlink_core::{
    constants::{
        DEFAULT_COMMAND_TIMEOUT, DEFAULT_READ_SLICE, DEFAULT_STARTUP_DRAIN, DEFAULT_STOP_GRACE,
    },
    ModuleFamily,
};

/// Settings fixed for the lifetime of a [`Reader`](crate::Reader)
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rfidlink::{ModuleFamily, ReaderConfig};
///
/// let config = ReaderConfig::new(ModuleFamily::M7eHecto)
///     .with_command_timeout(Duration::from_millis(1500))
///     .with_stop_grace(Duration::from_secs(1));
///
/// assert_eq!(config.command_timeout, Duration::from_millis(1500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Module attached to the transport
    pub module: ModuleFamily,

    /// Deadline for a synchronous reply, reset by each keep-alive
    pub command_timeout: Duration,

    /// How long `stop_reading` waits for the stop acknowledgement
    pub stop_grace: Duration,

    /// Longest single transport wait inside `next_tags`
    pub read_slice: Duration,

    /// Time spent discarding boot chatter when the reader is opened
    pub startup_drain: Duration,
}

impl ReaderConfig {
    /// Defaults for the given module
    pub fn new(module: ModuleFamily) -> Self {
        Self {
            module,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            stop_grace: DEFAULT_STOP_GRACE,
            read_slice: DEFAULT_READ_SLICE,
            startup_drain: DEFAULT_STARTUP_DRAIN,
        }
    }

    pub fn with_module(mut self, module: ModuleFamily) -> Self {
        self.module = module;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn with_read_slice(mut self, slice: Duration) -> Self {
        self.read_slice = slice;
        self
    }

    /// Set the startup drain window (zero skips draining)
    pub fn with_startup_drain(mut self, drain: Duration) -> Self {
        self.startup_drain = drain;
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::new(ModuleFamily::default())
    }
}
