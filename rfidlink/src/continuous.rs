//! Continuous tag reading
//!
//! While streaming, the module pushes tag reports, keep-alives and
//! occasional status notices without being asked. [`ContinuousReadSession`]
//! owns the session state and turns buffered frames into [`StreamEvent`]s.
//! It never reads the transport on its own except while starting and
//! stopping; the [`Reader`](crate::Reader) feeds it bytes.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use rfidlink_core::{
    constants::status, frame, report, tag, Error as CoreError, Frame, ModuleProfile, ReportKind,
    SessionGuard, SessionState, StreamAssembler, TagRecord,
};
use rfidlink_transport::Transport;

use crate::{error::Result, transaction::Transaction};

/// Something observed while streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A decoded tag record
    Tag(TagRecord),

    /// Status report worth surfacing (temperature, antenna, other status)
    Notice(ReportKind),

    /// Tag report that could not be decoded; streaming continues
    Malformed(CoreError),
}

/// Result of stopping a continuous read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopOutcome {
    /// Tags reported between the stop request and its acknowledgement
    pub tags: Vec<TagRecord>,

    /// Whether the module acknowledged within the grace period
    pub acknowledged: bool,
}

/// State machine for one continuous read at a time
#[derive(Debug)]
pub struct ContinuousReadSession {
    guard: SessionGuard,
    profile: &'static ModuleProfile,
    command_timeout: Duration,
    stop_grace: Duration,
}

impl ContinuousReadSession {
    pub fn new(profile: &'static ModuleProfile, command_timeout: Duration, stop_grace: Duration) -> Self {
        Self {
            guard: SessionGuard::new(),
            profile,
            command_timeout,
            stop_grace,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.guard.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.guard.is_streaming()
    }

    /// Fail unless a synchronous command may be sent
    pub fn ensure_idle(&self) -> Result<()> {
        Ok(self.guard.ensure_idle()?)
    }

    /// Force the session back to idle
    pub fn reset(&mut self) {
        self.guard.reset();
    }

    /// Ask the module to start streaming
    ///
    /// On any failure the session is back in `Idle` when this returns.
    pub async fn start<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        assembler: &mut StreamAssembler,
    ) -> Result<()> {
        self.guard.begin_start()?;

        let request = self.profile.start_request();
        let result = Transaction::new(transport, assembler, self.profile, request)
            .execute(self.command_timeout)
            .await;

        match result {
            Ok(_) => {
                self.guard.started()?;
                info!(module = self.profile.name, "Continuous reading started");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to start continuous reading");
                self.fail(assembler, e.is_fatal());
                Err(e)
            }
        }
    }

    /// Turn buffered frames into events without waiting
    ///
    /// Outside `Streaming` complete frames are drained and dropped.
    pub fn poll_events(&mut self, assembler: &mut StreamAssembler) -> Result<Vec<StreamEvent>> {
        let frames = match assembler.poll() {
            Ok(frames) => frames,
            Err(e) => {
                self.fail(assembler, true);
                return Err(e.into());
            }
        };

        if !self.guard.is_streaming() {
            if !frames.is_empty() {
                debug!(count = frames.len(), state = %self.guard.state(), "Dropping frames outside streaming");
            }
            return Ok(Vec::new());
        }

        Ok(frames
            .iter()
            .filter_map(|frame| self.event(frame))
            .collect())
    }

    /// Tags only; malformed reports and notices are logged and dropped
    pub fn poll(&mut self, assembler: &mut StreamAssembler) -> Result<Vec<TagRecord>> {
        Ok(self
            .poll_events(assembler)?
            .into_iter()
            .filter_map(|event| match event {
                StreamEvent::Tag(tag) => Some(tag),
                _ => None,
            })
            .collect())
    }

    /// Ask the module to stop and collect what arrives until it confirms
    ///
    /// Waits at most the stop grace period for the acknowledgement. The
    /// session is `Idle` afterwards whatever the outcome; frames buffered
    /// behind the acknowledgement are left for later polls to discard.
    ///
    /// # Errors
    ///
    /// [`CoreError::ModuleError`] if the acknowledgement carries a non-zero
    /// status; transport and desynchronization errors as they occur.
    pub async fn stop<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        assembler: &mut StreamAssembler,
    ) -> Result<StopOutcome> {
        self.guard.begin_stop()?;

        let result = self.drain_until_ack(transport, assembler).await;

        match &result {
            Ok(outcome) => {
                self.guard.reset();
                info!(
                    tags = outcome.tags.len(),
                    acknowledged = outcome.acknowledged,
                    "Continuous reading stopped"
                );
            }
            Err(e) => self.fail(assembler, e.is_fatal()),
        }

        result
    }

    async fn drain_until_ack<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        assembler: &mut StreamAssembler,
    ) -> Result<StopOutcome> {
        let request = self.profile.stop_request();
        let encoded = frame::encode(request.opcode, &request.payload)?;

        debug!(request = %request, "Sending stop request");
        transport.send(&encoded).await?;

        let deadline = Instant::now() + self.stop_grace;
        let mut outcome = StopOutcome::default();

        loop {
            while let Some(frame) = assembler.next_frame()? {
                if frame.opcode == request.opcode {
                    return match frame.status() {
                        Some(code) if code != status::SUCCESS => Err(CoreError::ModuleError {
                            opcode: frame.opcode,
                            status: code,
                        }
                        .into()),
                        _ => {
                            outcome.acknowledged = true;
                            Ok(outcome)
                        }
                    };
                }

                if let Some(StreamEvent::Tag(tag)) = self.event(&frame) {
                    outcome.tags.push(tag);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    grace_ms = self.stop_grace.as_millis() as u64,
                    "No stop acknowledgement within grace period"
                );
                return Ok(outcome);
            }

            let chunk = transport.read_available(deadline - now).await?;
            assembler.feed(&chunk);
        }
    }

    fn event(&self, frame: &Frame) -> Option<StreamEvent> {
        match report::classify(frame, self.profile) {
            ReportKind::KeepAlive => {
                trace!("Keep-alive");
                None
            }
            ReportKind::TagFound => match tag::parse(frame, &self.profile.tag_report) {
                Ok(tag) => {
                    debug!(tag = %tag, "Tag read");
                    Some(StreamEvent::Tag(tag))
                }
                Err(e) => {
                    warn!(error = %e, frame = %frame, "Malformed tag report");
                    Some(StreamEvent::Malformed(e))
                }
            },
            ReportKind::Foreign(opcode) => {
                debug!(opcode, "Ignoring frame while streaming");
                None
            }
            kind => {
                if kind.is_warning() {
                    warn!(report = %kind, "Module warning");
                } else {
                    debug!(report = %kind, "Module notice");
                }
                Some(StreamEvent::Notice(kind))
            }
        }
    }

    fn fail(&mut self, assembler: &mut StreamAssembler, fatal: bool) {
        self.guard.reset();
        if fatal {
            assembler.clear();
        }
    }
}
