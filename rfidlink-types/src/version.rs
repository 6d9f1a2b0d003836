//! Module version information

use std::fmt;

use chrono::NaiveDate;

use crate::error::{Error, Result};

/// Reply to the version command
///
/// Layout, 20 bytes: bootloader(4) hardware(4) firmware date(4, BCD
/// `YYYYMMDD`) firmware version(4) supported protocols(4, bitmask).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub bootloader: [u8; 4],
    pub hardware: [u8; 4],
    /// `None` if the date bytes are not valid BCD or not a calendar date
    pub firmware_date: Option<NaiveDate>,
    pub firmware_version: [u8; 4],
    pub supported_protocols: u32,
}

impl VersionInfo {
    pub const WIRE_LEN: usize = 20;

    /// Parse the reply data (status word already removed)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::WIRE_LEN {
            return Err(Error::Parse(format!(
                "version reply needs {} bytes, got {}",
                Self::WIRE_LEN,
                data.len()
            )));
        }

        let quad = |at: usize| [data[at], data[at + 1], data[at + 2], data[at + 3]];
        let date = quad(8);

        Ok(Self {
            bootloader: quad(0),
            hardware: quad(4),
            firmware_date: bcd_date(&date),
            firmware_version: quad(12),
            supported_protocols: u32::from_be_bytes(quad(16)),
        })
    }

    /// Check the Gen2 bit (protocol 0x05) in the protocol mask
    pub fn supports_gen2(&self) -> bool {
        self.supported_protocols & (1 << (0x05 - 1)) != 0
    }
}

fn bcd(byte: u8) -> Option<u32> {
    let (hi, lo) = (byte >> 4, byte & 0x0F);
    (hi < 10 && lo < 10).then(|| u32::from(hi) * 10 + u32::from(lo))
}

fn bcd_date(raw: &[u8; 4]) -> Option<NaiveDate> {
    let year = bcd(raw[0])? * 100 + bcd(raw[1])?;
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, bcd(raw[2])?, bcd(raw[3])?)
}

fn dotted(bytes: &[u8; 4]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(".")
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HW {} BL {} FW {}",
            dotted(&self.hardware),
            dotted(&self.bootloader),
            dotted(&self.firmware_version)
        )?;
        if let Some(date) = self.firmware_date {
            write!(f, " ({})", date)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const NANO_REPLY: [u8; 20] = [
        0x12, 0x12, 0x00, 0x00, // bootloader
        0x18, 0x00, 0x00, 0x02, // hardware
        0x20, 0x17, 0x04, 0x27, // firmware date
        0x01, 0x03, 0x01, 0x00, // firmware version
        0x00, 0x00, 0x00, 0x10, // protocols
    ];

    #[test]
    fn test_parse_version() {
        let info = VersionInfo::parse(&NANO_REPLY).unwrap();

        assert_eq!(
            info,
            VersionInfo {
                bootloader: [0x12, 0x12, 0x00, 0x00],
                hardware: [0x18, 0x00, 0x00, 0x02],
                firmware_date: NaiveDate::from_ymd_opt(2017, 4, 27),
                firmware_version: [0x01, 0x03, 0x01, 0x00],
                supported_protocols: 0x10,
            }
        );
        assert!(info.supports_gen2());
        assert_eq!(info.to_string(), "HW 18.00.00.02 BL 12.12.00.00 FW 01.03.01.00 (2017-04-27)");
    }

    #[test]
    fn test_invalid_bcd_date() {
        let mut reply = NANO_REPLY;
        reply[10] = 0x1A;
        assert_eq!(VersionInfo::parse(&reply).unwrap().firmware_date, None);

        reply[10] = 0x13; // month 13
        assert_eq!(VersionInfo::parse(&reply).unwrap().firmware_date, None);
    }

    #[test]
    fn test_short_reply() {
        assert!(matches!(VersionInfo::parse(&NANO_REPLY[..12]), Err(Error::Parse(_))));
    }
}
