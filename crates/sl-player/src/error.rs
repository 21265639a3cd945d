// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the playback controller

use thiserror::Error;

/// Errors surfaced by the playback controller
///
/// Everything here is terminal for the current load; recoverable conditions
/// (a malformed frame, a transport-control call at the wrong time) never
/// reach this enum.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Transport error: {0}")]
    Transport(#[from] sl_rest_client::RestClientError),

    #[error("Contract error: {0}")]
    Contract(#[from] sl_api_contract::ApiContractError),

    #[error("No session data")]
    NoSessionData,

    #[error("The stream was interrupted after {events_decoded} events")]
    StreamInterrupted {
        events_decoded: usize,
        #[source]
        source: sl_rest_client::RestClientError,
    },

    #[error("A load is already in progress")]
    LoadInProgress,

    #[error("Replay engine construction failed: {0}")]
    EngineInit(String),

    #[error("The controller was closed")]
    Closed,
}

pub type PlayerResult<T> = Result<T, PlayerError>;
