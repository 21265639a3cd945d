// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Session-replay playback orchestration
//!
//! This crate drives the playback of recorded browser sessions fetched
//! over the streaming REST API in `sl-rest-client`. The centerpiece is
//! [`ReplayStreamController`]: it loads the action list, consumes the
//! chunked event stream, constructs a replay engine once enough events
//! have arrived, and exposes the play / pause / seek transport on top.
//!
//! The rendering engine itself sits behind the [`ReplayEngine`] trait;
//! [`HeadlessEngine`] is the built-in renderless implementation used by
//! the CLI and the test suite.

pub mod actions;
pub mod controller;
pub mod engine;
pub mod error;
pub mod playback;
pub mod scale;
pub mod session;
pub mod sinks;
pub mod warnings;

pub use actions::ActionTracker;
pub use controller::{ControllerConfig, PlaybackSnapshot, ReplayStreamController};
pub use engine::{
    EngineCallbacks, EngineConfig, EngineWarning, HeadlessEngine, HeadlessEngineFactory,
    ReplayEngine, ReplayEngineFactory,
};
pub use error::{PlayerError, PlayerResult};
pub use playback::{Phase, PlayTransition, PlaybackState};
pub use scale::fit_scale;
pub use session::{StreamSession, MIN_EVENTS_FOR_ENGINE};
pub use sinks::{ActionSink, NullSink, ProgressSink, ShellSink};
pub use warnings::WarningFilter;
