//! Gen2 tag memory banks

use std::fmt;

use crate::error::{Error, Result};

/// Tag memory bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemoryBank {
    /// Kill and access passwords
    Reserved = 0,
    Epc = 1,
    Tid = 2,
    User = 3,
}

impl MemoryBank {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MemoryBank {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Reserved),
            1 => Ok(Self::Epc),
            2 => Ok(Self::Tid),
            3 => Ok(Self::User),
            other => Err(Error::Validation(format!("memory bank {} out of range", other))),
        }
    }
}

impl fmt::Display for MemoryBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reserved => "reserved",
            Self::Epc => "EPC",
            Self::Tid => "TID",
            Self::User => "user",
        };
        f.write_str(name)
    }
}
