// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Replay engine seam
//!
//! The rendering engine is a third-party concern; the controller talks to
//! it only through the `ReplayEngine` trait. Instead of intercepting global
//! error reporting, engines emit structured warnings on a channel supplied
//! at construction time, and a finish notification when playback reaches
//! the end of the recording.
//!
//! `HeadlessEngine` is the built-in implementation: it renders nothing and
//! tracks a virtual clock, which is enough for the CLI and for tests.

use sl_api_contract::RecordedEvent;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::error::PlayerError;

/// A structured warning emitted by a replay engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineWarning {
    pub message: String,
}

/// Notification channels handed to an engine at construction time
#[derive(Debug, Clone)]
pub struct EngineCallbacks {
    /// Signalled once when playback reaches the end of the recording
    pub finished: mpsc::UnboundedSender<()>,
    /// Structured warning channel replacing any global error interception
    pub warnings: mpsc::UnboundedSender<EngineWarning>,
}

/// Engine construction parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Viewport dimensions from the session's meta event
    pub viewport: (u32, u32),
    /// Uniform scale factor fitting the viewport into the container
    pub scale: f64,
    pub callbacks: EngineCallbacks,
}

/// Transport-facing surface of a replay rendering engine
pub trait ReplayEngine: Send {
    /// Append one more event while the stream is still arriving
    fn add_event(&mut self, event: RecordedEvent);

    /// Start or resume playback, optionally at a relative offset
    fn play(&mut self, at_ms: Option<i64>);

    fn pause(&mut self);

    /// Jump to a relative offset without changing the play/pause state
    fn seek(&mut self, at_ms: i64);

    /// Current playback position, when the engine exposes one. The
    /// controller falls back to its wall-clock anchor otherwise.
    fn current_time(&mut self) -> Option<i64>;

    /// Release engine resources. The controller treats failure as
    /// non-fatal and falls back to `pause`.
    fn destroy(&mut self) -> Result<(), PlayerError>;
}

/// Builds engine instances for the controller
pub trait ReplayEngineFactory: Send + Sync {
    fn build(
        &self,
        config: EngineConfig,
        initial_events: Vec<RecordedEvent>,
    ) -> Result<Box<dyn ReplayEngine>, PlayerError>;
}

/// Renderless engine driven by a virtual clock
///
/// Playback duration is derived from the timestamp span of the events it
/// holds. Events arriving out of timestamp order extend the span but also
/// raise a warning, since the progressive feed is in arrival order.
pub struct HeadlessEngine {
    callbacks: EngineCallbacks,
    first_ts: Option<i64>,
    last_ts: Option<i64>,
    /// Relative offset playback last started or jumped to
    offset_ms: i64,
    started_at: Option<Instant>,
    finished_sent: bool,
}

impl HeadlessEngine {
    fn new(callbacks: EngineCallbacks, initial_events: Vec<RecordedEvent>) -> Self {
        let mut engine = Self {
            callbacks,
            first_ts: None,
            last_ts: None,
            offset_ms: 0,
            started_at: None,
            finished_sent: false,
        };
        for event in initial_events {
            engine.track(&event);
        }
        engine
    }

    fn track(&mut self, event: &RecordedEvent) {
        let ts = event.timestamp;
        if let Some(last) = self.last_ts {
            if ts < last {
                let _ = self.callbacks.warnings.send(EngineWarning {
                    message: format!("event timestamp regressed from {} to {}", last, ts),
                });
            }
        }
        self.first_ts = Some(self.first_ts.map_or(ts, |prev| prev.min(ts)));
        self.last_ts = Some(self.last_ts.map_or(ts, |prev| prev.max(ts)));
    }

    fn duration_ms(&self) -> i64 {
        match (self.first_ts, self.last_ts) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        }
    }
}

impl ReplayEngine for HeadlessEngine {
    fn add_event(&mut self, event: RecordedEvent) {
        self.track(&event);
    }

    fn play(&mut self, at_ms: Option<i64>) {
        if let Some(at) = at_ms {
            self.offset_ms = at;
        }
        self.started_at = Some(Instant::now());
        self.finished_sent = false;
    }

    fn pause(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.offset_ms += started.elapsed().as_millis() as i64;
        }
    }

    fn seek(&mut self, at_ms: i64) {
        self.offset_ms = at_ms;
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.finished_sent = false;
    }

    fn current_time(&mut self) -> Option<i64> {
        let elapsed = self
            .started_at
            .map(|started| started.elapsed().as_millis() as i64)
            .unwrap_or(0);
        let pos = (self.offset_ms + elapsed).min(self.duration_ms());

        if pos >= self.duration_ms() && self.started_at.is_some() && !self.finished_sent {
            self.finished_sent = true;
            self.started_at = None;
            self.offset_ms = self.duration_ms();
            let _ = self.callbacks.finished.send(());
        }

        Some(pos)
    }

    fn destroy(&mut self) -> Result<(), PlayerError> {
        self.started_at = None;
        Ok(())
    }
}

/// Factory for `HeadlessEngine`
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessEngineFactory;

impl ReplayEngineFactory for HeadlessEngineFactory {
    fn build(
        &self,
        config: EngineConfig,
        initial_events: Vec<RecordedEvent>,
    ) -> Result<Box<dyn ReplayEngine>, PlayerError> {
        Ok(Box::new(HeadlessEngine::new(
            config.callbacks,
            initial_events,
        )))
    }
}
