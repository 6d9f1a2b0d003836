//! Transport layer for the reader protocol
//!
//! Provides the byte link to a reader module: a local serial port, or a
//! serial port exported over TCP by a bridge such as ser2net.
//!
//! Transports move bytes only. They do not preserve message boundaries; a
//! read may return part of a frame or several frames at once.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod serial;
pub mod tcp;

pub use error::{Error, Result};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;
pub use serial::{DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits};
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

/// Byte link to a reader module
#[async_trait]
pub trait Transport: Send {
    /// Write all bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Return whatever bytes arrive within `max_wait`
    ///
    /// Returns an empty buffer if nothing arrived in time; a timeout is not
    /// an error at this level.
    async fn read_available(&mut self, max_wait: Duration) -> Result<Bytes>;

    /// Close the link
    ///
    /// Subsequent `send()` and `read_available()` calls return
    /// [`Error::NotConnected`].
    async fn close(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Human-readable endpoint (port name or address)
    fn endpoint(&self) -> String;
}
