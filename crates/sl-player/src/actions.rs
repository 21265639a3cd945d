// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Action-list synchronization
//!
//! The action list arrives once, read-only, with the upfront request. The
//! tracker recomputes the full completion mask from scratch on every tick,
//! so seeking backward correctly un-marks entries; nothing is incremental.

use sl_api_contract::{ActionKind, ActionListEntry};

/// Read-only view over the session's action list plus completion bookkeeping
#[derive(Debug)]
pub struct ActionTracker {
    actions: Vec<ActionListEntry>,
    /// Row matching the caller-supplied error timestamp, for pinpoint marking
    pinpoint: Option<usize>,
    auto_scroll: bool,
}

impl ActionTracker {
    pub fn new(actions: Vec<ActionListEntry>, error_log_tm: Option<i64>, auto_scroll: bool) -> Self {
        let pinpoint = error_log_tm.and_then(|tm| {
            // Prefer an error row at the exact offset; fall back to any row
            actions
                .iter()
                .position(|a| a.action_tm == tm && a.kind() == ActionKind::Error)
                .or_else(|| actions.iter().position(|a| a.action_tm == tm))
        });

        Self {
            actions,
            pinpoint,
            auto_scroll,
        }
    }

    pub fn actions(&self) -> &[ActionListEntry] {
        &self.actions
    }

    pub fn pinpoint(&self) -> Option<usize> {
        self.pinpoint
    }

    /// Completion mask for an instant: entry `i` is completed iff its
    /// `actionTm` is at or before `current_time`
    pub fn completed_mask(&self, current_time: i64) -> Vec<bool> {
        self.actions.iter().map(|a| a.action_tm <= current_time).collect()
    }

    /// Row the list should scroll to: the most recently completed entry,
    /// only when auto-scroll is enabled
    pub fn scroll_target(&self, current_time: i64) -> Option<usize> {
        if !self.auto_scroll {
            return None;
        }
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.action_tm <= current_time)
            .map(|(i, _)| i)
            .last()
    }

    /// Seek target for a clicked row
    pub fn seek_target(&self, index: usize) -> Option<i64> {
        self.actions.get(index).map(|a| a.action_tm)
    }
}
