// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Outbound collaborator interfaces
//!
//! The controller does not prescribe UI chrome. The popup shell, the
//! progress indicator and the action-list table are all consumed through
//! these narrow traits; a terminal frontend, a GUI and the test suite plug
//! in equally.

/// Shell-level lifecycle notifications
pub trait ShellSink: Send + Sync {
    /// Transport controls may be enabled
    fn ready(&self) {}

    /// Terminal failure; the single error channel for all load failures
    fn error(&self, message: &str);

    /// Playback reached the end of the recording
    fn finished(&self) {}

    /// A transport control was used before the engine existed
    fn not_ready(&self) {}
}

/// Progress indicator updates
pub trait ProgressSink: Send + Sync {
    /// Coarse stream-load progress in percent
    fn load_progress(&self, percent: u8);

    /// The load indicator should be hidden
    fn load_complete(&self) {}

    /// Playback position update: fill percentage plus the raw offset
    fn playback_progress(&self, percent: f64, current_ms: i64);
}

/// Action-list table updates
pub trait ActionSink: Send + Sync {
    /// Replace the completion highlighting for the current instant and
    /// optionally scroll to a row
    fn mark_completed(&self, completed: &[bool], scroll_to: Option<usize>);

    /// Highlight the row matching an externally supplied error offset,
    /// announced once when the action list is installed
    fn pinpoint(&self, _row: Option<usize>) {}
}

/// Sink that ignores everything; useful for headless runs that only care
/// about a subset of notifications
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ShellSink for NullSink {
    fn error(&self, message: &str) {
        tracing::error!(message, "replay load failed");
    }
}

impl ProgressSink for NullSink {
    fn load_progress(&self, _percent: u8) {}
    fn playback_progress(&self, _percent: f64, _current_ms: i64) {}
}

impl ActionSink for NullSink {
    fn mark_completed(&self, _completed: &[bool], _scroll_to: Option<usize>) {}
}
