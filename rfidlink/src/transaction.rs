//! One synchronous command/response exchange
//!
//! A [`Transaction`] borrows the reader's transport and assembler for the
//! duration of a single command. It writes the request, then reads frames
//! one at a time until the reply with the matching opcode arrives or the
//! deadline passes. Keep-alives push the deadline back; any other frame is
//! dropped without touching it. Input already buffered when the request is
//! written is discarded first.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use rfidlink_core::{
    constants::status, frame, CommandRequest, Error as CoreError, Frame, ModuleProfile, Opcode,
    StreamAssembler,
};
use rfidlink_transport::Transport;

use crate::error::Result;

/// Single command in flight
pub struct Transaction<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    assembler: &'a mut StreamAssembler,
    profile: &'a ModuleProfile,
    request: CommandRequest,
}

impl<'a, T: Transport + ?Sized> Transaction<'a, T> {
    pub fn new(
        transport: &'a mut T,
        assembler: &'a mut StreamAssembler,
        profile: &'a ModuleProfile,
        request: CommandRequest,
    ) -> Self {
        Self {
            transport,
            assembler,
            profile,
            request,
        }
    }

    /// Send the request and wait for its reply
    ///
    /// `timeout` is the longest silence tolerated: every keep-alive restarts
    /// it, so a module busy with a long tag operation is waited for as long
    /// as it keeps signalling.
    ///
    /// # Errors
    ///
    /// - [`CoreError::PayloadTooLarge`] before anything is written
    /// - [`CoreError::CommandTimeout`] if no reply arrives in time
    /// - [`CoreError::ModuleError`] if the reply carries a non-zero status
    /// - [`CoreError::StreamDesynchronized`] and transport errors as they occur
    pub async fn execute(mut self, timeout: Duration) -> Result<Frame> {
        let opcode = self.request.opcode;

        self.write().await?;

        let mut deadline = Instant::now() + timeout;

        loop {
            while let Some(frame) = self.assembler.next_frame()? {
                if self.profile.is_keep_alive(&frame) {
                    deadline = Instant::now() + timeout;
                    trace!(opcode = Opcode::describe(opcode), "Keep-alive, deadline extended");
                    continue;
                }

                if frame.opcode == opcode {
                    debug!(reply = %frame, "Reply received");
                    return check_status(frame);
                }

                debug!(frame = %frame, "Discarding frame while waiting for reply");
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(opcode = Opcode::describe(opcode), "Command timed out");
                return Err(CoreError::CommandTimeout { opcode, timeout }.into());
            }

            let chunk = self.transport.read_available(deadline - now).await?;
            self.assembler.feed(&chunk);
        }
    }

    /// Send the request without waiting for anything
    ///
    /// For commands after which the module cannot answer on the current
    /// link settings, such as a baud-rate change.
    pub async fn send_only(mut self) -> Result<()> {
        self.write().await
    }

    async fn write(&mut self) -> Result<()> {
        let encoded = frame::encode(self.request.opcode, &self.request.payload)?;

        // Anything buffered now predates the request and cannot be its reply
        let stale = self.assembler.buffered();
        if stale > 0 {
            debug!(bytes = stale, "Discarding input received before request");
            self.assembler.clear();
        }

        debug!(
            request = %self.request,
            endpoint = %self.transport.endpoint(),
            "Sending command"
        );

        self.transport.send(&encoded).await?;
        Ok(())
    }
}

fn check_status(frame: Frame) -> Result<Frame> {
    match frame.status() {
        Some(code) if code != status::SUCCESS => Err(CoreError::ModuleError {
            opcode: frame.opcode,
            status: code,
        }
        .into()),
        _ => Ok(frame),
    }
}
