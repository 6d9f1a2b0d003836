//! Scripted transport for protocol tests
//!
//! [`MockTransport`] plays back bytes on a timeline. Expectations pair an
//! exact request with reply chunks, each delivered at an offset from the
//! moment the request is sent. Unsolicited bytes (stream reports, line noise)
//! can be queued with [`push_incoming`](MockTransport::push_incoming).
//!
//! Timing uses `tokio::time`, so tests under a paused clock run instantly
//! while still observing deadlines.
//!
//! ```
//! use rfidlink_transport::MockTransport;
//! use std::time::Duration;
//!
//! let mut mock = MockTransport::new();
//! // Version request, reply split into two chunks 10ms apart
//! mock.expect_timed(
//!     &[0xFF, 0x00, 0x03, 0x1D, 0x0C],
//!     &[
//!         (Duration::ZERO, &[0xFF, 0x02][..]),
//!         (Duration::from_millis(10), &[0x03, 0x00, 0x00, 0x12, 0x34][..]),
//!     ],
//! );
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::time::Instant;
use tracing::trace;

use crate::{error::*, Transport};

#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    replies: Vec<(Duration, Bytes)>,
}

#[derive(Debug, Clone)]
struct Scheduled {
    at: Instant,
    data: Bytes,
}

/// In-memory [`Transport`] driven by a script
///
/// Expectations are consumed in order. A `send()` that does not match the
/// next expectation, or arrives when none remain, fails with
/// [`Error::UnexpectedWrite`].
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    incoming: Vec<Scheduled>,
    connected: bool,
    sent_log: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a connected mock with an empty script
    pub fn new() -> Self {
        Self {
            expectations: VecDeque::new(),
            incoming: Vec::new(),
            connected: true,
            sent_log: Vec::new(),
        }
    }

    /// Expect `request` and reply with `response` immediately
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expect_timed(request, &[(Duration::ZERO, response)]);
    }

    /// Expect `request` and send nothing back
    pub fn expect_silent(&mut self, request: &[u8]) {
        self.expect_timed(request, &[]);
    }

    /// Expect `request` and reply with chunks at offsets from the send
    pub fn expect_timed(&mut self, request: &[u8], replies: &[(Duration, &[u8])]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            replies: replies
                .iter()
                .map(|(delay, data)| (*delay, Bytes::copy_from_slice(data)))
                .collect(),
        });
    }

    /// Queue unsolicited bytes, available immediately
    pub fn push_incoming(&mut self, data: &[u8]) {
        self.push_incoming_after(Duration::ZERO, data);
    }

    /// Queue unsolicited bytes, available after `delay` from now
    pub fn push_incoming_after(&mut self, delay: Duration, data: &[u8]) {
        self.schedule(Instant::now() + delay, Bytes::copy_from_slice(data));
    }

    /// All data written so far, one entry per `send()`
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Number of expectations not yet consumed
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Number of scheduled chunks not yet read
    pub fn pending_incoming(&self) -> usize {
        self.incoming.len()
    }

    /// Simulate the link going away (or coming back)
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    fn schedule(&mut self, at: Instant, data: Bytes) {
        // Keep delivery order stable for equal instants
        let pos = self.incoming.partition_point(|s| s.at <= at);
        self.incoming.insert(pos, Scheduled { at, data });
    }

    fn take_due(&mut self, now: Instant) -> Bytes {
        let due = self.incoming.partition_point(|s| s.at <= now);
        let mut out = BytesMut::new();
        for chunk in self.incoming.drain(..due) {
            out.extend_from_slice(&chunk.data);
        }
        out.freeze()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data.to_vec());

        let expectation = self.expectations.pop_front().ok_or_else(|| {
            Error::UnexpectedWrite(format!("no expectation left for {}", hex::encode_upper(data)))
        })?;

        if data != expectation.request.as_slice() {
            return Err(Error::UnexpectedWrite(format!(
                "expected {}, got {}",
                hex::encode_upper(&expectation.request),
                hex::encode_upper(data)
            )));
        }

        let now = Instant::now();
        for (delay, reply) in expectation.replies {
            self.schedule(now + delay, reply);
        }

        Ok(())
    }

    async fn read_available(&mut self, max_wait: Duration) -> Result<Bytes> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let now = Instant::now();
        let deadline = now + max_wait;

        match self.incoming.first().map(|s| s.at) {
            Some(at) if at <= now => {}
            Some(at) if at <= deadline => tokio::time::sleep_until(at).await,
            _ => {
                tokio::time::sleep_until(deadline).await;
                return Ok(Bytes::new());
            }
        }

        let data = self.take_due(Instant::now());
        trace!(len = data.len(), "Mock delivered bytes");
        Ok(data)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.incoming.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn endpoint(&self) -> String {
        "mock".to_string()
    }
}
