//! Reassembly of frames from a fragmented byte stream
//!
//! The transport may split or coalesce frames arbitrarily. [`StreamAssembler`]
//! keeps the not-yet-consumed bytes in a single `BytesMut` and hands out
//! complete frames as they become available.
//!
//! # Example
//!
//! ```
//! use rfidlink_core::StreamAssembler;
//!
//! let mut assembler = StreamAssembler::new();
//!
//! // Version request arriving in two reads
//! assembler.feed(&[0xFF, 0x00]);
//! assert!(assembler.poll().unwrap().is_empty());
//!
//! assembler.feed(&[0x03, 0x1D, 0x0C]);
//! let frames = assembler.poll().unwrap();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].opcode, 0x03);
//! ```

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use crate::{
    constants::{DESYNC_LIMIT, MAX_FRAME_LEN},
    error::{Error, Result},
    frame::{self, Corruption, Decoded, Frame},
};

/// Buffer for accumulating incoming bytes and extracting complete frames
#[derive(Debug)]
pub struct StreamAssembler {
    /// Bytes received but not yet consumed
    buffer: BytesMut,

    /// Bytes discarded as corrupt since the last good frame
    discarded_run: usize,

    /// Limit on `discarded_run`
    desync_limit: usize,

    /// Corruption events not yet collected by the caller
    corruptions: Vec<Corruption>,
}

impl StreamAssembler {
    /// Create an assembler with the default desynchronization limit
    pub fn new() -> Self {
        Self::with_desync_limit(DESYNC_LIMIT)
    }

    /// Create an assembler with a custom desynchronization limit
    pub fn with_desync_limit(desync_limit: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(2 * MAX_FRAME_LEN),
            discarded_run: 0,
            desync_limit,
            corruptions: Vec::new(),
        }
    }

    /// Append newly received bytes
    pub fn feed(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }

        trace!(
            len = bytes.len(),
            buffered = self.buffer.len(),
            data = %hex::encode_upper(bytes),
            "Feeding bytes"
        );

        self.buffer.extend_from_slice(bytes);
    }

    /// Decode the next complete frame, if any
    ///
    /// Corrupt bytes at the head are skipped and recorded; scanning continues
    /// until a frame is found or more data is needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamDesynchronized`] once more than the limit of
    /// bytes has been discarded without a valid frame. The buffer is cleared.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match frame::decode(&self.buffer) {
                Decoded::Frame(frame, consumed) => {
                    self.buffer.advance(consumed);
                    self.discarded_run = 0;

                    trace!(frame = %frame, remaining = self.buffer.len(), "Frame assembled");

                    return Ok(Some(frame));
                }
                Decoded::NeedMoreData => return Ok(None),
                Decoded::Corrupt(corruption) => {
                    let consumed = corruption.consumed();
                    self.buffer.advance(consumed);
                    self.discarded_run += consumed;

                    if let Corruption::ChecksumMismatch { .. } = corruption {
                        warn!(%corruption, "Dropping corrupt frame");
                    } else {
                        trace!(%corruption, "Resynchronizing");
                    }
                    self.corruptions.push(corruption);

                    if self.discarded_run > self.desync_limit {
                        let discarded = self.discarded_run + self.buffer.len();
                        warn!(discarded, "Stream desynchronized, clearing buffer");
                        self.clear();
                        return Err(Error::StreamDesynchronized { discarded });
                    }
                }
            }
        }
    }

    /// Decode every complete frame currently buffered
    pub fn poll(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Collect the corruption events recorded since the last call
    pub fn take_corruptions(&mut self) -> Vec<Corruption> {
        std::mem::take(&mut self.corruptions)
    }

    /// Discard all buffered bytes and counters
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarded_run = 0;
    }

    /// Number of bytes waiting to be consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Check if no bytes are waiting
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::new()
    }
}
