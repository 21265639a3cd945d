// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Playback state machine
//!
//! `PlaybackState` is a pure, synchronous state machine over four phases:
//! Unstarted, Playing, Paused and Finished. It owns the current playback
//! position (milliseconds relative to the session start) and a wall-clock
//! anchor used to project elapsed time when the engine exposes no position
//! accessor. It knows nothing about engines, sinks or streams; the
//! controller translates its transitions into engine calls.

use std::time::Instant;

/// Playback phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unstarted,
    Playing,
    Paused,
    Finished,
}

/// What the caller must do to the engine after a `play()` transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTransition {
    /// Start the engine at the given relative offset (first play; the
    /// offset is nonzero when a seek happened before playback started)
    Start { at_ms: i64 },
    /// Resume the engine at the given relative offset
    Resume { at_ms: i64 },
    /// Playback had finished; start over from zero
    Restart,
    /// Already playing; nothing to do
    NoOp,
}

/// Mutable state of a single replay session
#[derive(Debug)]
pub struct PlaybackState {
    phase: Phase,
    current_time: i64,
    total_duration: i64,
    /// Wall-clock anchor such that `now - anchor == current_time` while
    /// playing; avoids polling a third-party clock every frame
    anchor: Option<Instant>,
}

impl PlaybackState {
    pub fn new(total_duration: i64) -> Self {
        Self {
            phase: Phase::Unstarted,
            current_time: 0,
            total_duration: total_duration.max(0),
            anchor: None,
        }
    }

    /// State with no replay engine constructed: not playing, not paused,
    /// position zero, zero duration
    pub fn idle() -> Self {
        Self::new(0)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    pub fn current_time(&self) -> i64 {
        self.current_time
    }

    pub fn total_duration(&self) -> i64 {
        self.total_duration
    }

    /// Playback position as a percentage of total duration
    pub fn progress_percent(&self) -> f64 {
        if self.total_duration == 0 {
            return 0.0;
        }
        (self.current_time as f64 / self.total_duration as f64) * 100.0
    }

    /// Transition towards Playing. Clicking play after completion always
    /// restarts from zero; it never resumes from the end.
    pub fn play(&mut self, now: Instant) -> PlayTransition {
        match self.phase {
            Phase::Unstarted => {
                self.phase = Phase::Playing;
                self.anchor = anchor_for(now, self.current_time);
                PlayTransition::Start {
                    at_ms: self.current_time,
                }
            }
            Phase::Paused => {
                self.phase = Phase::Playing;
                self.anchor = anchor_for(now, self.current_time);
                PlayTransition::Resume {
                    at_ms: self.current_time,
                }
            }
            Phase::Finished => {
                self.phase = Phase::Playing;
                self.current_time = 0;
                self.anchor = Some(now);
                PlayTransition::Restart
            }
            Phase::Playing => PlayTransition::NoOp,
        }
    }

    /// Playing -> Paused; no-op in any other phase. Returns whether the
    /// transition happened.
    pub fn pause(&mut self) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        self.phase = Phase::Paused;
        self.anchor = None;
        true
    }

    /// Jump to a target offset, clamped into `[0, total_duration]`.
    /// Never changes phase: playing stays playing, paused stays paused.
    /// Returns the clamped target.
    pub fn seek(&mut self, target_ms: i64, now: Instant) -> i64 {
        let clamped = target_ms.clamp(0, self.total_duration);
        self.current_time = clamped;
        if self.phase == Phase::Playing {
            self.anchor = anchor_for(now, clamped);
        }
        clamped
    }

    /// Progress-poll update. While playing, adopt the engine-reported
    /// position when available, otherwise derive from the wall-clock
    /// anchor. Returns the updated position.
    pub fn tick(&mut self, engine_pos: Option<i64>, now: Instant) -> i64 {
        if self.phase != Phase::Playing {
            return self.current_time;
        }
        let pos = engine_pos.unwrap_or_else(|| {
            self.anchor
                .map(|anchor| now.duration_since(anchor).as_millis() as i64)
                .unwrap_or(self.current_time)
        });
        self.current_time = pos.clamp(0, self.total_duration);
        self.current_time
    }

    /// Terminal transition reported by the engine's finish notification
    pub fn finish(&mut self) {
        self.phase = Phase::Finished;
        self.current_time = self.total_duration;
        self.anchor = None;
    }

    /// Back to the no-engine state
    pub fn reset(&mut self) {
        *self = Self::idle();
    }
}

fn anchor_for(now: Instant, current_time: i64) -> Option<Instant> {
    now.checked_sub(std::time::Duration::from_millis(current_time.max(0) as u64))
}
