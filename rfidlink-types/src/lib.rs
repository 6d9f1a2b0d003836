//! Value types shared by the rfidlink crates
//!
//! Plain data with no protocol or I/O logic: regions, firmware version
//! information, GPIO levels and tag memory banks.

pub mod error;
pub mod gpio;
pub mod memory;
pub mod region;
pub mod version;

pub use error::{Error, Result};
pub use gpio::{PinLevel, PinMode, PinState};
pub use memory::MemoryBank;
pub use region::Region;
pub use version::VersionInfo;
