//! Event definitions for the orchestrator event loop.
//!
//! This module defines the `Event` enum which encapsulates everything that
//! drives the orchestrator: user triggers, outcome reports from the writer
//! context, timed indicator reverts, and shutdown signals.

/// Represents an event in the orchestrator's main event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// The user asked for the current window's tab URLs to be copied.
    Triggered,
    /// A copy cycle ended before its payload reached the writer context.
    CycleAborted { error: String },
    /// The writer context wrote the payload to the clipboard.
    CopySucceeded,
    /// The writer context exhausted both copy mechanisms.
    CopyFailed { error: String },
    /// The success feedback window elapsed; restore the default indicator.
    IndicatorRevert,
    /// A termination signal was received.
    Shutdown,
}
