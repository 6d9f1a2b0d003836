//! ThingMagic frame CRC
//!
//! CRC-16 with polynomial 0x1021, register initialised to 0xFFFF and no
//! reflection, computed four bits at a time:
//!
//! ```text
//! for each byte b:
//!     crc = ((crc << 4) | (b >> 4))   ^ TABLE[crc >> 12]
//!     crc = ((crc << 4) | (b & 0x0F)) ^ TABLE[crc >> 12]
//! ```
//!
//! Data nibbles are shifted into the low end of the register, which is the
//! variant the module firmware checks. It does not match the textbook
//! CRC-16/CCITT-FALSE output for the same input.

use tracing::trace;

/// Polynomial 0x1021 multiples for every 4-bit value
const TABLE: [u16; 16] = [
    0x0000, 0x1021, 0x2042, 0x3063, 0x4084, 0x50A5, 0x60C6, 0x70E7,
    0x8108, 0x9129, 0xA14A, 0xB16B, 0xC18C, 0xD1AD, 0xE1CE, 0xF1EF,
];

/// Initial register value
pub const INIT: u16 = 0xFFFF;

/// Calculate the CRC over `LEN ‖ OPCODE ‖ PAYLOAD`
///
/// # Examples
///
/// ```
/// use rfidlink_core::crc;
///
/// // Version request: FF 00 03 1D 0C
/// assert_eq!(crc::calculate(&[0x00, 0x03]), 0x1D0C);
/// ```
pub fn calculate(data: &[u8]) -> u16 {
    let crc = data.iter().fold(INIT, |crc, &byte| step(crc, byte));

    trace!(
        len = data.len(),
        crc = format_args!("0x{:04X}", crc),
        "Calculated CRC"
    );

    crc
}

/// Calculate the CRC of a frame from its parts, without building a buffer
pub fn calculate_frame(opcode: u8, payload: &[u8]) -> u16 {
    // LEN is one byte on the wire; callers bound the payload to 255
    let len = payload.len() as u8;
    let crc = [len, opcode]
        .iter()
        .chain(payload)
        .fold(INIT, |crc, &byte| step(crc, byte));

    trace!(
        opcode,
        len,
        crc = format_args!("0x{:04X}", crc),
        "Calculated frame CRC"
    );

    crc
}

/// Shift one byte into the register, high nibble first
fn step(crc: u16, byte: u8) -> u16 {
    let crc = ((crc << 4) | u16::from(byte >> 4)) ^ TABLE[usize::from(crc >> 12)];
    ((crc << 4) | u16::from(byte & 0x0F)) ^ TABLE[usize::from(crc >> 12)]
}

/// Verify a received CRC
pub fn verify(data: &[u8], expected: u16) -> bool {
    calculate(data) == expected
}
