// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the replay REST client

use sl_api_contract::ProblemDetails;
use thiserror::Error;

/// Errors returned by the replay REST client
#[derive(Debug, Error)]
pub enum RestClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Contract error: {0}")]
    Contract(#[from] sl_api_contract::ApiContractError),

    #[error("Server error {status}: {}", details.detail)]
    ServerError {
        status: reqwest::StatusCode,
        details: ProblemDetails,
    },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type RestClientResult<T> = Result<T, RestClientError>;
