// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Main REST API client implementation

use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use sl_api_contract::{ActionListResponse, ProblemDetails, SessionQuery, validate_session_query};
use url::Url;

use crate::error::{RestClientError, RestClientResult};
use crate::stream::ReplayEventStream;

/// REST API client for the SessionLens replay service
#[derive(Debug, Clone)]
pub struct ReplayClient {
    http_client: HttpClient,
    base_url: Url,
}

impl ReplayClient {
    /// Create a new replay client
    pub fn new(base_url: Url) -> RestClientResult<Self> {
        let http_client = HttpClient::builder()
            .user_agent("sessionlens/0.1")
            .build()
            .map_err(RestClientError::Http)?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Create a client from a base URL string
    pub fn from_url(base_url: &str) -> RestClientResult<Self> {
        let base_url = Url::parse(base_url)?;
        Self::new(base_url)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch the action list and session time window for a session.
    ///
    /// This is the small upfront request issued before the event stream; its
    /// `sessionStartTm`/`sessionEndTm` fix the playback duration.
    pub async fn action_list(&self, query: &SessionQuery) -> RestClientResult<ActionListResponse> {
        validate_session_query(query)?;
        let url = self.base_url.join("/api/v1/replay/actionList")?;
        let response = self.http_client.post(url).json(query).send().await?;
        self.handle_response(response).await
    }

    /// Open the replay event stream for a session.
    ///
    /// The response body is a chunked sequence of JSON frames with no
    /// delimiter; termination is connection close. Decoding happens on a
    /// background task, surfaced as a `Stream` of `RecordedEvent`.
    pub async fn stream_events(&self, query: &SessionQuery) -> RestClientResult<ReplayEventStream> {
        validate_session_query(query)?;
        let url = self.base_url.join("/api/v1/replay/stream")?;
        let response = self.http_client.post(url).json(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(error_from_body(status, text));
        }

        Ok(ReplayEventStream::spawn(response))
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> RestClientResult<T> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(RestClientError::from)
        } else {
            Err(error_from_body(status, text))
        }
    }
}

fn error_from_body(status: reqwest::StatusCode, text: String) -> RestClientError {
    match serde_json::from_str::<ProblemDetails>(&text) {
        Ok(problem) => RestClientError::ServerError {
            status,
            details: problem,
        },
        Err(_) => RestClientError::UnexpectedResponse(text),
    }
}
