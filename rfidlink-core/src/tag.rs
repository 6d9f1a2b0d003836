//! Tag records decoded from streamed tag reports
//!
//! # Report Layout
//!
//! ```text
//! ┌────────┬──────────┬───────────┬─────┬──────────────┬─────────┬─────┬─────┬─────────┐
//! │ Status │ Options  │ Meta flags│ RFU │ Metadata ... │ EPC len │ PC  │ EPC │ EPC CRC │
//! │ 2      │ 3        │ 2 (BE)    │ 1   │ per flags    │ 2 (bits)│ 2   │ N   │ 2       │
//! └────────┴──────────┴───────────┴─────┴──────────────┴─────────┴─────┴─────┴─────────┘
//! ```
//!
//! Metadata fields are present only when their flag is set, and always in
//! flag-bit order. All multi-byte values are big-endian.

use std::fmt;

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::{
    error::{Error, Result},
    frame::Frame,
    module::TagReportLayout,
};

bitflags! {
    /// Metadata fields included in a tag report
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TagMetadata: u16 {
        const READ_COUNT = 0x0001;
        const RSSI = 0x0002;
        const ANTENNA_ID = 0x0004;
        const FREQUENCY = 0x0008;
        const TIMESTAMP = 0x0010;
        const PHASE = 0x0020;
        const PROTOCOL = 0x0040;
        const DATA = 0x0080;
        const GPIO_STATUS = 0x0100;
    }
}

impl TagMetadata {
    /// Fields every record needs
    pub const REQUIRED: Self = Self::RSSI.union(Self::FREQUENCY).union(Self::TIMESTAMP);
}

/// PC word plus EPC CRC, both counted in the EPC bit length
const EPC_FRAMING_BYTES: usize = 4;

/// One tag observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    /// Electronic Product Code
    pub epc: Bytes,

    /// Protocol control word
    pub pc: u16,

    /// Signal strength, dBm
    pub rssi: i8,

    /// Carrier frequency, kHz
    pub frequency_khz: u32,

    /// Device-relative timestamp, ms since the read started
    pub timestamp: u32,

    /// Times the tag was seen in this report window
    pub read_count: Option<u8>,

    /// Antenna the tag was seen on
    pub antenna: Option<u8>,

    /// Backscatter phase, degrees
    pub phase: Option<u16>,

    /// Air protocol identifier
    pub protocol: Option<u8>,

    /// Embedded tag data
    pub data: Option<Bytes>,

    /// GPIO levels at read time
    pub gpio: Option<u8>,
}

impl TagRecord {
    /// EPC as an uppercase hex string
    pub fn epc_hex(&self) -> String {
        hex::encode_upper(&self.epc)
    }
}

impl fmt::Display for TagRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tag[{}](rssi={}dBm, freq={}kHz, t={}ms)",
            self.epc_hex(),
            self.rssi,
            self.frequency_khz,
            self.timestamp
        )
    }
}

/// Bounds-checked reader over a report payload
struct Fields<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos + len;
        if end > self.payload.len() {
            return Err(Error::WrongShape(format!(
                "{} needs bytes {}..{} but payload is {} bytes",
                what,
                self.pos,
                end,
                self.payload.len()
            )));
        }
        let field = &self.payload[self.pos..end];
        self.pos = end;
        Ok(field)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2, what)?))
    }

    fn u24(&mut self, what: &str) -> Result<u32> {
        Ok(BigEndian::read_u24(self.take(3, what)?))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4, what)?))
    }
}

/// Decode a tag report frame into a [`TagRecord`]
///
/// # Errors
///
/// Returns [`Error::WrongShape`] if the opcode is not the tag report opcode,
/// a required metadata field is missing, or any declared length runs past
/// the end of the payload. Never panics on malformed input.
pub fn parse(frame: &Frame, layout: &TagReportLayout) -> Result<TagRecord> {
    if frame.opcode != layout.opcode {
        return Err(Error::WrongShape(format!(
            "opcode 0x{:02X} is not a tag report (0x{:02X})",
            frame.opcode, layout.opcode
        )));
    }

    let payload: &[u8] = &frame.payload;
    if payload.len() < layout.metadata_offset {
        return Err(Error::WrongShape(format!(
            "payload of {} bytes is shorter than the {}-byte report header",
            payload.len(),
            layout.metadata_offset
        )));
    }

    let raw_flags = BigEndian::read_u16(&payload[layout.flags_offset..layout.flags_offset + 2]);
    let flags = TagMetadata::from_bits_truncate(raw_flags);
    if !flags.contains(TagMetadata::REQUIRED) {
        return Err(Error::WrongShape(format!(
            "metadata flags 0x{:04X} lack RSSI, frequency or timestamp",
            raw_flags
        )));
    }

    let mut fields = Fields {
        payload,
        pos: layout.metadata_offset,
    };

    let read_count = flags
        .contains(TagMetadata::READ_COUNT)
        .then(|| fields.u8("read count"))
        .transpose()?;
    let rssi = fields.u8("RSSI")? as i8;
    let antenna = flags
        .contains(TagMetadata::ANTENNA_ID)
        .then(|| fields.u8("antenna"))
        .transpose()?;
    let frequency_khz = fields.u24("frequency")?;
    let timestamp = fields.u32("timestamp")?;
    let phase = flags
        .contains(TagMetadata::PHASE)
        .then(|| fields.u16("phase"))
        .transpose()?;
    let protocol = flags
        .contains(TagMetadata::PROTOCOL)
        .then(|| fields.u8("protocol"))
        .transpose()?;
    let data = if flags.contains(TagMetadata::DATA) {
        let bits = usize::from(fields.u16("data length")?);
        let data = fields.take(bits.div_ceil(8), "tag data")?;
        Some(Bytes::copy_from_slice(data))
    } else {
        None
    };
    let gpio = flags
        .contains(TagMetadata::GPIO_STATUS)
        .then(|| fields.u8("GPIO status"))
        .transpose()?;

    let epc_bits = usize::from(fields.u16("EPC length")?);
    let epc_len = (epc_bits / 8)
        .checked_sub(EPC_FRAMING_BYTES)
        .ok_or_else(|| Error::WrongShape(format!("EPC length of {} bits is too short", epc_bits)))?;
    let pc = fields.u16("PC word")?;
    let epc = Bytes::copy_from_slice(fields.take(epc_len, "EPC")?);
    fields.take(2, "EPC CRC")?;

    Ok(TagRecord {
        epc,
        pc,
        rssi,
        frequency_khz,
        timestamp,
        read_count,
        antenna,
        phase,
        protocol,
        data,
        gpio,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::module::ModuleFamily;
    use pretty_assertions::assert_eq;

    /// Build a tag report payload with the given metadata
    pub(crate) fn report_payload(flags: TagMetadata, epc: &[u8], data: &[u8]) -> Vec<u8> {
        let mut p = vec![0x00, 0x00, 0x10, 0x00, 0x1B];
        p.extend_from_slice(&flags.bits().to_be_bytes());
        p.push(0x00);
        if flags.contains(TagMetadata::READ_COUNT) {
            p.push(0x01);
        }
        if flags.contains(TagMetadata::RSSI) {
            p.push(0xC6); // -58 dBm
        }
        if flags.contains(TagMetadata::ANTENNA_ID) {
            p.push(0x11);
        }
        if flags.contains(TagMetadata::FREQUENCY) {
            p.extend_from_slice(&[0x0E, 0x25, 0x3C]); // 927036 kHz
        }
        if flags.contains(TagMetadata::TIMESTAMP) {
            p.extend_from_slice(&[0x00, 0x00, 0x01, 0x2C]);
        }
        if flags.contains(TagMetadata::PHASE) {
            p.extend_from_slice(&[0x00, 0x5A]);
        }
        if flags.contains(TagMetadata::PROTOCOL) {
            p.push(0x05);
        }
        if flags.contains(TagMetadata::DATA) {
            p.extend_from_slice(&((data.len() * 8) as u16).to_be_bytes());
            p.extend_from_slice(data);
        }
        if flags.contains(TagMetadata::GPIO_STATUS) {
            p.push(0x00);
        }
        p.extend_from_slice(&(((epc.len() + 4) * 8) as u16).to_be_bytes());
        p.extend_from_slice(&[0x30, 0x00]);
        p.extend_from_slice(epc);
        p.extend_from_slice(&[0xAB, 0xCD]);
        p
    }

    pub(crate) fn tag_frame(epc: &[u8]) -> Frame {
        Frame::with_payload(0x22u8, report_payload(TagMetadata::all(), epc, &[]))
    }

    fn layout() -> TagReportLayout {
        ModuleFamily::M6eNano.profile().tag_report
    }

    #[test]
    fn test_parse_full_record() {
        let epc = [0xE2, 0x00, 0x68, 0x94, 0x00, 0x00, 0x50, 0x20, 0x6F, 0x30, 0x12, 0x34];
        let frame = Frame::with_payload(
            0x22u8,
            report_payload(TagMetadata::all(), &epc, &[0xDE, 0xAD]),
        );

        let record = parse(&frame, &layout()).unwrap();

        assert_eq!(
            record,
            TagRecord {
                epc: Bytes::copy_from_slice(&epc),
                pc: 0x3000,
                rssi: -58,
                frequency_khz: 927_036,
                timestamp: 300,
                read_count: Some(1),
                antenna: Some(0x11),
                phase: Some(90),
                protocol: Some(5),
                data: Some(Bytes::from_static(&[0xDE, 0xAD])),
                gpio: Some(0),
            }
        );
        assert_eq!(record.epc_hex(), "E2006894000050206F301234");
    }

    #[test]
    fn test_parse_minimal_record() {
        let epc = [0x01, 0x02, 0x03, 0x04];
        let frame = Frame::with_payload(
            0x22u8,
            report_payload(TagMetadata::REQUIRED, &epc, &[]),
        );

        let record = parse(&frame, &layout()).unwrap();

        assert_eq!(record.epc.as_ref(), &epc);
        assert_eq!(record.antenna, None);
        assert_eq!(record.phase, None);
        assert_eq!(record.read_count, None);
        assert_eq!(record.data, None);
    }

    #[test]
    fn test_wrong_opcode() {
        let mut frame = tag_frame(&[0x01, 0x02]);
        frame.opcode = 0x2F;
        assert!(matches!(parse(&frame, &layout()), Err(Error::WrongShape(_))));
    }

    #[test]
    fn test_short_header() {
        let frame = Frame::with_payload(0x22u8, vec![0x00, 0x00, 0x10]);
        assert!(matches!(parse(&frame, &layout()), Err(Error::WrongShape(_))));
    }

    #[test]
    fn test_missing_required_metadata() {
        let flags = TagMetadata::RSSI | TagMetadata::FREQUENCY;
        let frame = Frame::with_payload(0x22u8, report_payload(flags, &[0x01], &[]));
        assert!(matches!(parse(&frame, &layout()), Err(Error::WrongShape(_))));
    }

    #[test]
    fn test_epc_length_past_payload() {
        let mut payload = report_payload(TagMetadata::REQUIRED, &[0x01, 0x02], &[]);
        // EPC length field sits right after the 8-byte metadata
        let epc_len_at = 8 + 1 + 3 + 4;
        payload[epc_len_at..epc_len_at + 2].copy_from_slice(&0x0200u16.to_be_bytes());
        let frame = Frame::with_payload(0x22u8, payload);

        assert!(matches!(parse(&frame, &layout()), Err(Error::WrongShape(_))));
    }

    #[test]
    fn test_epc_length_too_short() {
        let mut payload = report_payload(TagMetadata::REQUIRED, &[], &[]);
        let epc_len_at = 8 + 1 + 3 + 4;
        payload[epc_len_at..epc_len_at + 2].copy_from_slice(&16u16.to_be_bytes());
        let frame = Frame::with_payload(0x22u8, payload);

        assert!(matches!(parse(&frame, &layout()), Err(Error::WrongShape(_))));
    }

    #[test]
    fn test_truncated_payloads_never_panic() {
        let full = report_payload(TagMetadata::all(), &[0xAA; 12], &[0x01, 0x02, 0x03]);
        for len in 0..full.len() {
            let frame = Frame::with_payload(0x22u8, full[..len].to_vec());
            assert!(parse(&frame, &layout()).is_err(), "len {} parsed", len);
        }
    }
}
