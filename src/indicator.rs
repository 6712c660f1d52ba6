//! User-visible copy feedback.
//!
//! The indicator is the toolbar-icon analog: a one-line status on stderr that
//! briefly switches to its success variant after a copy and reverts on a
//! timer. The trait keeps the orchestrator testable without a terminal.

use std::io::Write;
use std::sync::Mutex;

use anyhow::{Context, Result};

/// Visual states of the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconState {
    /// Resting state.
    Default,
    /// Transient state shown after a successful copy.
    Success,
}

/// Surface the orchestrator paints feedback on.
pub trait Indicator: Send + Sync {
    fn set_state(&self, state: IconState) -> Result<()>;
}

/// Renders the indicator as a rewritten status line on stderr.
pub struct TermIndicator;

impl TermIndicator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TermIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for TermIndicator {
    fn set_state(&self, state: IconState) -> Result<()> {
        let line = match state {
            IconState::Default => "\r\x1b[2K  tabclip ready",
            IconState::Success => "\r\x1b[2K\x1b[32m\u{2714} tabs copied\x1b[0m",
        };
        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(line.as_bytes())
            .context("failed to write indicator")?;
        stderr.flush().context("failed to flush indicator")?;
        Ok(())
    }
}

/// Captures every state change, in order, for inspection in tests.
#[derive(Default)]
pub struct RecordingIndicator {
    states: Mutex<Vec<IconState>>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// All states observed so far.
    pub fn states(&self) -> Vec<IconState> {
        self.states.lock().unwrap().clone()
    }
}

impl Indicator for RecordingIndicator {
    fn set_state(&self, state: IconState) -> Result<()> {
        self.states.lock().unwrap().push(state);
        Ok(())
    }
}
