//! Session state for continuous reading
//!
//! A reader is in exactly one of four states. Synchronous commands, starting
//! and stopping all go through the same [`SessionGuard`], so a command can
//! never be issued while the module is streaming.
//!
//! ```text
//!          start()            ack ok
//!  Idle ─────────────▶ Requesting ─────────▶ Streaming
//!   ▲                      │ timeout/error       │ stop()
//!   │◀─────────────────────┘                     ▼
//!   └─────────────── ack / grace elapsed ─── Stopping
//! ```
//!
//! Any fatal stream error returns the guard to `Idle` from every state.

use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No continuous read in progress; commands allowed
    #[default]
    Idle,

    /// Start request sent, waiting for its acknowledgement
    Requesting,

    /// Module is streaming tag reports
    Streaming,

    /// Stop request sent, draining in-flight reports
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Owner of the session state and its transitions
#[derive(Debug, Default)]
pub struct SessionGuard {
    state: SessionState,
}

impl SessionGuard {
    /// Create a guard in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if streaming
    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// Fail unless idle
    pub fn ensure_idle(&self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(Error::InvalidSessionState(format!(
                "command not allowed while {}; stop reading first",
                self.state
            )));
        }
        Ok(())
    }

    /// Idle → Requesting
    pub fn begin_start(&mut self) -> Result<()> {
        self.transition(SessionState::Idle, SessionState::Requesting)
    }

    /// Requesting → Streaming
    pub fn started(&mut self) -> Result<()> {
        self.transition(SessionState::Requesting, SessionState::Streaming)
    }

    /// Streaming → Stopping
    pub fn begin_stop(&mut self) -> Result<()> {
        self.transition(SessionState::Streaming, SessionState::Stopping)
    }

    /// Any state → Idle
    pub fn reset(&mut self) {
        if self.state != SessionState::Idle {
            debug!(from = %self.state, "Session reset to idle");
        }
        self.state = SessionState::Idle;
    }

    fn transition(&mut self, from: SessionState, to: SessionState) -> Result<()> {
        if self.state != from {
            return Err(Error::InvalidSessionState(format!(
                "cannot go to {} from {} (expected {})",
                to, self.state, from
            )));
        }

        debug!(%from, %to, "Session transition");
        self.state = to;
        Ok(())
    }
}
