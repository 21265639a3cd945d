// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Engine warning filtering
//!
//! Replay engines are noisy: sandboxed-frame and cross-origin complaints
//! show up on every session and carry no signal. The filter suppresses a
//! fixed allowlist of substrings and forwards everything else to the
//! application's normal log stream, so unrelated warnings are never
//! swallowed.

use crate::engine::EngineWarning;

/// Substring allowlist for warnings that may be demoted to debug level
#[derive(Debug, Clone)]
pub struct WarningFilter {
    allowlist: Vec<String>,
}

impl WarningFilter {
    pub fn new(allowlist: Vec<String>) -> Self {
        Self { allowlist }
    }

    /// Patterns known to be emitted routinely by replay engines
    pub fn default_allowlist() -> Vec<String> {
        vec![
            "Blocked a frame with origin".to_string(),
            "sandboxed and the 'allow-scripts' permission".to_string(),
            "event timestamp regressed".to_string(),
        ]
    }

    pub fn suppresses(&self, message: &str) -> bool {
        self.allowlist.iter().any(|pattern| message.contains(pattern))
    }

    /// Route one warning to the log stream at the appropriate level
    pub fn report(&self, warning: &EngineWarning) {
        if self.suppresses(&warning.message) {
            tracing::debug!(message = %warning.message, "suppressed engine warning");
        } else {
            tracing::warn!(message = %warning.message, "replay engine warning");
        }
    }
}

impl Default for WarningFilter {
    fn default() -> Self {
        Self::new(Self::default_allowlist())
    }
}
