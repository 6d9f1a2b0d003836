//! Frame builders shared by the unit tests

use rfidlink_core::{frame, TagMetadata};

pub(crate) fn encoded(opcode: u8, payload: &[u8]) -> Vec<u8> {
    frame::encode(opcode, payload).unwrap().to_vec()
}

/// Encoded tag report with RSSI, frequency and timestamp metadata
pub(crate) fn tag_report(epc: &[u8]) -> Vec<u8> {
    let flags = TagMetadata::RSSI | TagMetadata::FREQUENCY | TagMetadata::TIMESTAMP;

    let mut p = vec![0x00, 0x00, 0x10, 0x00, 0x1B];
    p.extend_from_slice(&flags.bits().to_be_bytes());
    p.push(0x00);
    p.push(0xC6); // -58 dBm
    p.extend_from_slice(&[0x0E, 0x25, 0x3C]);
    p.extend_from_slice(&[0x00, 0x00, 0x01, 0x2C]);
    p.extend_from_slice(&(((epc.len() + 4) * 8) as u16).to_be_bytes());
    p.extend_from_slice(&[0x30, 0x00]);
    p.extend_from_slice(epc);
    p.extend_from_slice(&[0xAB, 0xCD]);

    encoded(0x22, &p)
}
