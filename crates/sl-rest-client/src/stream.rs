// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Streaming support for the chunked replay event body

use futures::StreamExt;
use futures::stream::Stream;
use sl_api_contract::RecordedEvent;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::error::RestClientError;
use crate::frame::FrameDecoder;

/// Stream of recorded events decoded from the chunked `stream` response
///
/// A spawned reader task pulls chunks off the HTTP body, runs them through
/// the frame scanner and pushes decoded events into a bounded channel. A
/// frame that fails to parse is logged and skipped; only transport failures
/// terminate the stream with an error item.
pub struct ReplayEventStream {
    receiver: mpsc::Receiver<Result<RecordedEvent, RestClientError>>,
    handle: tokio::task::JoinHandle<()>,
}

impl ReplayEventStream {
    pub(crate) fn spawn(response: reqwest::Response) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = FrameDecoder::new();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx.send(Err(RestClientError::Http(err))).await;
                        return;
                    }
                };

                for raw in decoder.push(&chunk) {
                    match parse_frame(&raw) {
                        Ok(event) => {
                            if tx.send(Ok(event)).await.is_err() {
                                // Consumer gone; stop reading the body
                                return;
                            }
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, frame_len = raw.len(), "skipping malformed replay frame");
                        }
                    }
                }
            }

            if decoder.has_partial() {
                tracing::warn!(
                    residue = decoder.residue_len(),
                    "replay stream ended mid-frame; trailing bytes discarded"
                );
            }
        });

        Self {
            receiver: rx,
            handle,
        }
    }

    /// Abort the background reader, dropping the HTTP connection.
    /// Safe to call at any time, including after the stream has ended.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for ReplayEventStream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Stream for ReplayEventStream {
    type Item = Result<RecordedEvent, RestClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

fn parse_frame(raw: &str) -> Result<RecordedEvent, RestClientError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    Ok(RecordedEvent::from_frame(value)?)
}
