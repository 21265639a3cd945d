// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! API contract types for the SessionLens replay service
//!
//! This crate defines the wire types exchanged with the replay backend:
//! recorded session events, the action list, the session time window and
//! the request/response bodies for the `actionList` and `stream` endpoints.
//! It deliberately carries no HTTP machinery so that third-party tooling
//! can consume the contract without pulling in a client stack.

pub mod error;
pub mod types;
pub mod validation;

pub use error::*;
pub use types::*;
pub use validation::*;
