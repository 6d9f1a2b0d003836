//! Regulatory frequency regions

use std::fmt;

use crate::error::{Error, Result};

/// Frequency region the module hops within
///
/// The numeric values are the codes the module expects on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Region {
    NorthAmerica = 0x01,
    India = 0x04,
    Japan = 0x05,
    China = 0x06,
    Europe = 0x08,
    Korea = 0x09,
    Australia = 0x0B,
    NewZealand = 0x0C,
    NorthAmerica2 = 0x0D,
    NorthAmerica3 = 0x0E,
    Open = 0xFF,
}

impl Region {
    /// Wire code
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Region {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x01 => Ok(Self::NorthAmerica),
            0x04 => Ok(Self::India),
            0x05 => Ok(Self::Japan),
            0x06 => Ok(Self::China),
            0x08 => Ok(Self::Europe),
            0x09 => Ok(Self::Korea),
            0x0B => Ok(Self::Australia),
            0x0C => Ok(Self::NewZealand),
            0x0D => Ok(Self::NorthAmerica2),
            0x0E => Ok(Self::NorthAmerica3),
            0xFF => Ok(Self::Open),
            other => Err(Error::Validation(format!("unknown region code 0x{:02X}", other))),
        }
    }
}

impl From<Region> for u8 {
    fn from(region: Region) -> Self {
        region.code()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NorthAmerica => "North America",
            Self::India => "India",
            Self::Japan => "Japan",
            Self::China => "China",
            Self::Europe => "Europe",
            Self::Korea => "Korea",
            Self::Australia => "Australia",
            Self::NewZealand => "New Zealand",
            Self::NorthAmerica2 => "North America 2",
            Self::NorthAmerica3 => "North America 3",
            Self::Open => "Open",
        };
        f.write_str(name)
    }
}
