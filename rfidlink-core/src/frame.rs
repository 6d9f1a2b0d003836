//! Serial protocol frame structure and encoding/decoding

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    command::Opcode,
    constants::{FRAME_OVERHEAD, MAX_PAYLOAD_LEN, START_MARKER},
    crc,
    error::{Error, Result},
};

/// Serial protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────────┬─────────────┐
/// │  0xFF   │   LEN   │ OPCODE  │   PAYLOAD   │    CRC16    │
/// │ 1 byte  │ 1 byte  │ 1 byte  │  LEN bytes  │   2 bytes   │
/// │         │         │         │             │ (BE u16)    │
/// └─────────┴─────────┴─────────┴─────────────┴─────────────┘
/// ```
///
/// The CRC covers `LEN ‖ OPCODE ‖ PAYLOAD`. Responses carry the module
/// status word in the first two payload bytes.
///
/// # Examples
///
/// ```
/// use rfidlink_core::frame::{self, Decoded, Frame};
///
/// let encoded = frame::encode(0x22, &[]).unwrap();
/// assert_eq!(&encoded[..], &[0xFF, 0x00, 0x22, 0x1D, 0x2D]);
///
/// match frame::decode(&encoded) {
///     Decoded::Frame(frame, consumed) => {
///         assert_eq!(frame.opcode, 0x22);
///         assert_eq!(consumed, 5);
///     }
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw opcode byte
    pub opcode: u8,

    /// Frame payload (status word first, for responses)
    pub payload: Bytes,
}

/// Why bytes at the head of the stream were rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// Byte where a start marker was expected; one byte is discarded
    BadStartByte {
        offset: usize,
        byte: u8,
    },

    /// Complete frame whose CRC does not verify; the whole frame is discarded
    ChecksumMismatch {
        expected: u16,
        received: u16,
        consumed: usize,
    },
}

impl Corruption {
    /// Number of bytes the stream must skip past
    pub fn consumed(&self) -> usize {
        match self {
            Self::BadStartByte { .. } => 1,
            Self::ChecksumMismatch { consumed, .. } => *consumed,
        }
    }
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadStartByte { offset, byte } => {
                write!(f, "expected start marker at offset {}, found 0x{:02X}", offset, byte)
            }
            Self::ChecksumMismatch { expected, received, consumed } => write!(
                f,
                "checksum mismatch over {} bytes: expected 0x{:04X}, received 0x{:04X}",
                consumed, expected, received
            ),
        }
    }
}

/// Result of decoding the front of a byte slice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A valid frame and the number of bytes it occupied
    Frame(Frame, usize),

    /// Not enough bytes yet; nothing consumed
    NeedMoreData,

    /// Head of the input is not a valid frame
    Corrupt(Corruption),
}

/// Encode one frame
///
/// # Errors
///
/// Returns [`Error::PayloadTooLarge`] if the payload exceeds 255 bytes.
pub fn encode(opcode: u8, payload: &[u8]) -> Result<BytesMut> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());

    buf.put_u8(START_MARKER);
    buf.put_u8(payload.len() as u8);
    buf.put_u8(opcode);
    buf.put_slice(payload);
    buf.put_u16(crc::calculate_frame(opcode, payload));

    Ok(buf)
}

/// Try to decode one frame from the front of `buf`
///
/// Never consumes anything on [`Decoded::NeedMoreData`]. A bad start byte
/// consumes exactly one byte; a CRC failure consumes the whole declared
/// frame, since LEN is trusted for skipping.
pub fn decode(buf: &[u8]) -> Decoded {
    if buf.len() < FRAME_OVERHEAD {
        return Decoded::NeedMoreData;
    }

    if buf[0] != START_MARKER {
        return Decoded::Corrupt(Corruption::BadStartByte {
            offset: 0,
            byte: buf[0],
        });
    }

    let len = usize::from(buf[1]);
    let total = FRAME_OVERHEAD + len;
    if buf.len() < total {
        return Decoded::NeedMoreData;
    }

    let opcode = buf[2];
    let payload = &buf[3..3 + len];
    let received = u16::from_be_bytes([buf[total - 2], buf[total - 1]]);
    let expected = crc::calculate(&buf[1..3 + len]);

    if expected != received {
        return Decoded::Corrupt(Corruption::ChecksumMismatch {
            expected,
            received,
            consumed: total,
        });
    }

    Decoded::Frame(
        Frame {
            opcode,
            payload: Bytes::copy_from_slice(payload),
        },
        total,
    )
}

impl Frame {
    /// Create a frame with empty payload
    pub fn new(opcode: impl Into<u8>) -> Self {
        Self {
            opcode: opcode.into(),
            payload: Bytes::new(),
        }
    }

    /// Create a frame with payload
    pub fn with_payload(opcode: impl Into<u8>, payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: opcode.into(),
            payload: payload.into(),
        }
    }

    /// Encode frame to bytes
    pub fn encode(&self) -> Result<BytesMut> {
        encode(self.opcode, &self.payload)
    }

    /// Decode exactly one frame occupying the whole buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is incomplete, corrupt, or has trailing
    /// bytes.
    pub fn decode_exact(buf: &[u8]) -> Result<Self> {
        match decode(buf) {
            Decoded::Frame(frame, consumed) if consumed == buf.len() => Ok(frame),
            Decoded::Frame(_, consumed) => Err(Error::WrongShape(format!(
                "{} trailing bytes after frame",
                buf.len() - consumed
            ))),
            Decoded::NeedMoreData => Err(Error::WrongShape(format!(
                "incomplete frame ({} bytes)",
                buf.len()
            ))),
            Decoded::Corrupt(corruption) => Err(corruption.into()),
        }
    }

    /// Module status word, if the payload carries one
    ///
    /// Two or more payload bytes: big-endian u16 of the first two. A single
    /// byte is read as a one-byte status.
    pub fn status(&self) -> Option<u16> {
        match self.payload.as_ref() {
            [] => None,
            [only] => Some(u16::from(*only)),
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        }
    }

    /// Payload after the status word
    pub fn data(&self) -> Bytes {
        if self.payload.len() >= 2 {
            self.payload.slice(2..)
        } else {
            Bytes::new()
        }
    }

    /// Opcode as a known enum value
    pub fn known_opcode(&self) -> Result<Opcode> {
        Opcode::try_from(self.opcode)
    }

    /// Get total encoded size
    pub fn size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("opcode", &format!("0x{:02X}", self.opcode))
            .field("name", &Opcode::describe(self.opcode))
            .field("payload", &hex::encode_upper(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}(0x{:02X})](len={})",
            Opcode::describe(self.opcode),
            self.opcode,
            self.payload.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_encode_empty_payload() {
        let encoded = encode(0x22, &[]).unwrap();
        assert_eq!(&encoded[..], &[0xFF, 0x00, 0x22, 0x1D, 0x2D]);
    }

    #[test]
    fn test_encode_version_request() {
        let encoded = Frame::new(Opcode::Version).encode().unwrap();
        assert_eq!(&encoded[..], &[0xFF, 0x00, 0x03, 0x1D, 0x0C]);
    }

    #[test]
    fn test_decode_empty_payload() {
        let bytes = [0xFF, 0x00, 0x22, 0x1D, 0x2D];
        assert_eq!(
            decode(&bytes),
            Decoded::Frame(Frame::new(0x22u8), 5)
        );
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; 256];
        assert_eq!(
            encode(0x22, &payload),
            Err(Error::PayloadTooLarge { size: 256, max: 255 })
        );
        assert!(encode(0x22, &payload[..255]).is_ok());
    }

    #[test]
    fn test_need_more_data() {
        let encoded = encode(0x97, &[0x0D]).unwrap();

        assert_eq!(decode(&[]), Decoded::NeedMoreData);
        assert_eq!(decode(&encoded[..4]), Decoded::NeedMoreData);
        // Header says one payload byte, CRC still missing
        assert_eq!(decode(&encoded[..5]), Decoded::NeedMoreData);
    }

    #[test]
    fn test_bad_start_byte() {
        let bytes = [0x42, 0xFF, 0x00, 0x22, 0x1D, 0x2D];
        let result = decode(&bytes);

        assert_eq!(
            result,
            Decoded::Corrupt(Corruption::BadStartByte { offset: 0, byte: 0x42 })
        );
        if let Decoded::Corrupt(corruption) = result {
            assert_eq!(corruption.consumed(), 1);
        }
    }

    #[test]
    fn test_checksum_mismatch_consumes_frame() {
        let mut encoded = encode(0x97, &[0x0D]).unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0x01;

        match decode(&encoded) {
            Decoded::Corrupt(Corruption::ChecksumMismatch { expected, received, consumed }) => {
                assert_ne!(expected, received);
                assert_eq!(consumed, 6);
            }
            other => panic!("Expected ChecksumMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let mut bytes = encode(0x03, &[]).unwrap().to_vec();
        bytes.extend_from_slice(&[0xFF, 0x01]);

        match decode(&bytes) {
            Decoded::Frame(frame, consumed) => {
                assert_eq!(frame.opcode, 0x03);
                assert_eq!(consumed, 5);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_exact() {
        let encoded = encode(0x62, &[0x00, 0x00, 0x00, 0x0A, 0x8C]).unwrap();
        let frame = Frame::decode_exact(&encoded).unwrap();
        assert_eq!(frame.status(), Some(0x0000));
        assert_eq!(frame.data().as_ref(), &[0x00, 0x0A, 0x8C]);

        let mut longer = encoded.to_vec();
        longer.push(0x00);
        assert!(matches!(Frame::decode_exact(&longer), Err(Error::WrongShape(_))));
    }

    #[test]
    fn test_status() {
        assert_eq!(Frame::new(0x22u8).status(), None);
        assert_eq!(Frame::with_payload(0x22u8, vec![0x07]).status(), Some(0x07));
        assert_eq!(
            Frame::with_payload(0x22u8, vec![0x04, 0x00]).status(),
            Some(0x0400)
        );
        assert!(Frame::with_payload(0x22u8, vec![0x04]).data().is_empty());
    }

    #[test]
    fn test_debug_format() {
        let frame = Frame::with_payload(Opcode::SetRegion, vec![0x0D]);
        let debug = format!("{:?}", frame);
        assert!(debug.contains("0x97"));
        assert!(debug.contains("SET_REGION"));
        assert!(debug.contains("0D"));
    }

    proptest! {
        #[test]
        fn prop_round_trip(opcode in any::<u8>(), payload in proptest::collection::vec(any::<u8>(), 0..=255)) {
            let encoded = encode(opcode, &payload).unwrap();
            prop_assert_eq!(encoded.len(), payload.len() + FRAME_OVERHEAD);

            match decode(&encoded) {
                Decoded::Frame(frame, consumed) => {
                    prop_assert_eq!(frame.opcode, opcode);
                    prop_assert_eq!(frame.payload.as_ref(), payload.as_slice());
                    prop_assert_eq!(consumed, encoded.len());
                }
                other => prop_assert!(false, "decode failed: {:?}", other),
            }
        }

        #[test]
        fn prop_crc_bit_flip_detected(
            opcode in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..64),
            bit in 0usize..16,
        ) {
            let mut encoded = encode(opcode, &payload).unwrap();
            let crc_start = encoded.len() - 2;
            encoded[crc_start + bit / 8] ^= 1 << (bit % 8);

            let is_checksum_mismatch = matches!(
                decode(&encoded),
                Decoded::Corrupt(Corruption::ChecksumMismatch { .. })
            );
            prop_assert!(is_checksum_mismatch);
        }
    }
}
