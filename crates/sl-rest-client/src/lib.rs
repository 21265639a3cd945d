// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! REST API client for the SessionLens replay service
//!
//! This crate provides the HTTP client used by the playback stack: the
//! upfront `actionList` request that fixes the session time window, and the
//! chunked `stream` request whose body is a back-to-back sequence of JSON
//! frames. The body carries no framing delimiter or length prefix, so the
//! frame boundary is recovered by a brace-depth scanner (`frame` module)
//! that is a pure function of the bytes and independent of chunk boundaries.

pub mod client;
pub mod error;
pub mod frame;
pub mod network_config;
pub mod stream;

pub use client::*;
pub use error::*;
pub use frame::FrameDecoder;
pub use network_config::NetworkConfig;
pub use stream::ReplayEventStream;
