//! # rfidlink
//!
//! Async driver for ThingMagic M6E Nano and M7E Hecto UHF RFID reader
//! modules over a serial link.
//!
//! ## Features
//!
//! - Frame codec with CRC validation and resynchronization on corrupt input
//! - Synchronous commands that tolerate keep-alives and interleaved frames
//! - Continuous tag reading with structured tag records
//! - Serial and serial-over-TCP transports
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use rfidlink::{Reader, ReaderConfig, SerialTransport};
//!
//! #[tokio::main]
//! async fn main() -> rfidlink::Result<()> {
//!     let transport = SerialTransport::open("/dev/ttyUSB0", 115_200)?;
//!     let reader = Reader::open(transport, ReaderConfig::default()).await?;
//!
//!     reader
//!         .run(async |reader| {
//!             let version = reader.get_version().await?;
//!             println!("{}", version);
//!
//!             reader.start_reading().await?;
//!             for tag in reader.next_tags(Duration::from_secs(2)).await? {
//!                 println!("{}", tag);
//!             }
//!             reader.stop_reading().await?;
//!             Ok(())
//!         })
//!         .await
//! }
//! ```

pub mod config;
pub mod continuous;
pub mod error;
pub mod reader;
pub mod transaction;

#[cfg(test)]
mod test_support;

// Re-exports
pub use config::ReaderConfig;
pub use continuous::{ContinuousReadSession, StopOutcome, StreamEvent};
pub use error::{Error, Result};
pub use reader::Reader;
pub use transaction::Transaction;

// Re-export protocol and transport types
pub use rfidlink_core::{
    CommandRequest, Frame, ModuleFamily, Opcode, ReportKind, SessionState, TagMetadata, TagRecord,
};
pub use rfidlink_transport::{SerialConfig, SerialTransport, TcpTransport, Transport};
pub use rfidlink_types::{MemoryBank, PinLevel, PinMode, PinState, Region, VersionInfo};
