//! # rfidlink-core
//!
//! Core protocol implementation for ThingMagic UHF RFID reader modules.
//!
//! This crate provides the low-level protocol primitives, with no I/O:
//! - Frame structure and encoding/decoding
//! - CRC calculation
//! - Reassembly of frames from a fragmented byte stream
//! - Tag report decoding and classification
//! - Session state and module profiles

pub mod assembler;
pub mod command;
pub mod constants;
pub mod crc;
pub mod error;
pub mod frame;
pub mod module;
pub mod report;
pub mod session;
pub mod tag;

pub use assembler::StreamAssembler;
pub use command::{CommandRequest, Opcode};
pub use error::{Error, Result};
pub use frame::{Corruption, Decoded, Frame};
pub use module::{ModuleFamily, ModuleProfile, TagReportLayout};
pub use report::ReportKind;
pub use session::{SessionGuard, SessionState};
pub use tag::{TagMetadata, TagRecord};
