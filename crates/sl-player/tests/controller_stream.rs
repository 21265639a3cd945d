// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end controller tests against a local mock replay backend
//!
//! The mock serves the two POST endpoints over raw TCP: a canned action
//! list and a frame stream written in several pieces, so chunked decode,
//! progressive engine construction and failure handling are all exercised
//! over a real HTTP connection.

use serde_json::json;
use sl_player::{
    ActionSink, ControllerConfig, HeadlessEngineFactory, Phase, PlayerError, ProgressSink,
    ReplayStreamController, ShellSink,
};
use sl_rest_client::ReplayClient;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};

#[derive(Clone)]
enum StreamPlan {
    /// Write each piece with a short delay in between, correct length
    Chunks(Vec<String>),
    /// Advertise more bytes than are sent, then drop the connection
    Truncated { body: String, missing: usize },
    /// A well-formed empty body
    Empty,
}

async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() > 64 * 1024 {
            return None;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let lower = line.to_ascii_lowercase();
            let rest = lower.strip_prefix("content-length:")?;
            rest.trim().parse::<usize>().ok()
        })
        .unwrap_or(0);

    let mut body_read = buf.len() - header_end;
    while body_read < content_length {
        let n = socket.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        body_read += n;
    }

    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
}

async fn write_json(socket: &mut TcpStream, body: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn write_stream(socket: &mut TcpStream, plan: &StreamPlan) {
    match plan {
        StreamPlan::Chunks(pieces) => {
            let total: usize = pieces.iter().map(String::len).sum();
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                total
            );
            let _ = socket.write_all(head.as_bytes()).await;
            for piece in pieces {
                let _ = socket.write_all(piece.as_bytes()).await;
                let _ = socket.flush().await;
                sleep(Duration::from_millis(25)).await;
            }
            let _ = socket.shutdown().await;
        }
        StreamPlan::Truncated { body, missing } => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len() + missing
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(body.as_bytes()).await;
            let _ = socket.flush().await;
            // Let the client consume the prefix before the connection dies
            sleep(Duration::from_millis(50)).await;
        }
        StreamPlan::Empty => write_json(socket, "").await,
    }
}

/// Serve the two replay endpoints; returns the base URL
async fn spawn_backend(action_body: String, plan: StreamPlan) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let action_body = action_body.clone();
            let plan = plan.clone();
            tokio::spawn(async move {
                let Some(path) = read_request(&mut socket).await else {
                    return;
                };
                if path.contains("actionList") {
                    write_json(&mut socket, &action_body).await;
                } else {
                    write_stream(&mut socket, &plan).await;
                }
            });
        }
    });

    format!("http://{}", addr)
}

fn action_body() -> String {
    json!({
        "actionList": [
            {"actionTm": 500, "logType": "PAGE_LOAD"},
            {"actionTm": 2000, "logType": "CLICK"},
            {"actionTm": 3500, "logType": "JS_ERROR"}
        ],
        "sessionStartTm": 1000,
        "sessionEndTm": 5000
    })
    .to_string()
}

fn frame(event_type: i64, timestamp: i64) -> String {
    json!({"0#f": {"type": event_type, "timestamp": timestamp}}).to_string()
}

fn meta_frame(timestamp: i64) -> String {
    json!({
        "0#f": {"type": 4, "timestamp": timestamp, "data": {"width": 800, "height": 600}}
    })
    .to_string()
}

/// A full well-formed session: one meta frame plus enough events to cross
/// the progressive-construction threshold mid-stream
fn full_session_chunks() -> Vec<String> {
    let first = format!(
        "{}{}{}",
        meta_frame(1000),
        frame(2, 1500),
        frame(2, 2000)
    );
    let second = format!("{}{}", frame(2, 2500), frame(3, 3000));
    let third = format!("{}{}", frame(2, 4000), frame(2, 5000));
    vec![first, second, third]
}

#[derive(Default)]
struct SinkLog {
    entries: Mutex<Vec<String>>,
    finish_signal: Notify,
}

impl SinkLog {
    fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    fn count(&self, tag: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(tag))
            .count()
    }
}

impl ShellSink for SinkLog {
    fn ready(&self) {
        self.push("ready");
    }
    fn error(&self, message: &str) {
        self.push(format!("error:{}", message));
    }
    fn finished(&self) {
        self.push("finished");
        self.finish_signal.notify_one();
    }
    fn not_ready(&self) {
        self.push("not_ready");
    }
}

impl ProgressSink for SinkLog {
    fn load_progress(&self, percent: u8) {
        self.push(format!("load:{}", percent));
    }
    fn load_complete(&self) {
        self.push("load_complete");
    }
    fn playback_progress(&self, _percent: f64, current_ms: i64) {
        self.push(format!("pos:{}", current_ms));
    }
}

impl ActionSink for SinkLog {
    fn mark_completed(&self, completed: &[bool], _scroll_to: Option<usize>) {
        let mask: String = completed.iter().map(|c| if *c { '1' } else { '0' }).collect();
        self.push(format!("mask:{}", mask));
    }

    fn pinpoint(&self, row: Option<usize>) {
        if let Some(row) = row {
            self.push(format!("pinpoint:{}", row));
        }
    }
}

fn test_config() -> ControllerConfig {
    ControllerConfig {
        package_name: "com.example.shop".to_string(),
        server_type: "java".to_string(),
        poll_interval: Duration::from_millis(20),
        ..ControllerConfig::default()
    }
}

fn controller_with_config(
    base_url: &str,
    sink: Arc<SinkLog>,
    config: ControllerConfig,
) -> ReplayStreamController {
    let client = ReplayClient::from_url(base_url).unwrap();
    ReplayStreamController::new(
        client,
        Arc::new(HeadlessEngineFactory),
        sink.clone(),
        sink.clone(),
        sink,
        config,
    )
}

fn controller_for(base_url: &str, sink: Arc<SinkLog>) -> ReplayStreamController {
    controller_with_config(base_url, sink, test_config())
}

#[tokio::test(flavor = "multi_thread")]
async fn load_decodes_stream_and_reports_ready_once() {
    let base = spawn_backend(action_body(), StreamPlan::Chunks(full_session_chunks())).await;
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for(&base, sink.clone());

    controller.load("abc123", None).await.unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, Phase::Unstarted);
    assert_eq!(snapshot.total_duration, 4000);

    // Engine readiness is announced exactly once even though the engine
    // was constructed mid-stream
    assert_eq!(sink.count("ready"), 1);
    assert!(sink.count("load_complete") >= 1);
    assert_eq!(sink.count("error"), 0);

    // Load progress moved through the session window
    let loads: Vec<String> = sink
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("load:"))
        .collect();
    assert_eq!(loads.first().map(String::as_str), Some("load:0"));
    assert_eq!(loads.last().map(String::as_str), Some("load:100"));
}

#[tokio::test(flavor = "multi_thread")]
async fn short_stream_defers_engine_construction_to_completion() {
    // Too few events for mid-stream construction; the engine is built
    // from the full sorted set once the stream ends
    let body = format!("{}{}", meta_frame(1000), frame(2, 2500));
    let base = spawn_backend(action_body(), StreamPlan::Chunks(vec![body])).await;
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for(&base, sink.clone());

    controller.load("abc123", None).await.unwrap();

    assert_eq!(sink.count("ready"), 1);
    assert_eq!(controller.snapshot().total_duration, 4000);

    controller.play();
    assert_eq!(controller.snapshot().phase, Phase::Playing);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_stream_is_no_session_data() {
    let base = spawn_backend(action_body(), StreamPlan::Empty).await;
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for(&base, sink.clone());

    let err = controller.load("abc123", None).await.unwrap_err();
    assert!(matches!(err, PlayerError::NoSessionData));

    // The failure reaches the shell's single error channel
    assert_eq!(sink.count("error"), 1);
    assert_eq!(sink.count("ready"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn mid_stream_failure_discards_partial_session() {
    let body = format!("{}{}", meta_frame(1000), frame(2, 1500));
    let base = spawn_backend(action_body(), StreamPlan::Truncated { body, missing: 512 }).await;
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for(&base, sink.clone());

    let err = controller.load("abc123", None).await.unwrap_err();
    match err {
        PlayerError::StreamInterrupted { events_decoded, .. } => {
            assert_eq!(events_decoded, 2);
        }
        other => panic!("expected StreamInterrupted, got {:?}", other),
    }

    // The decoded prefix is not offered for playback
    controller.play();
    assert_eq!(sink.count("not_ready"), 1);
    assert_eq!(controller.snapshot().phase, Phase::Unstarted);
}

#[tokio::test(flavor = "multi_thread")]
async fn initial_seek_is_honored_once_stream_catches_up() {
    let base = spawn_backend(action_body(), StreamPlan::Chunks(full_session_chunks())).await;
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for(&base, sink.clone());

    // Absolute 3000 within the 1000..5000 window is relative 2000
    controller.load("abc123", Some(3000)).await.unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, Phase::Unstarted);
    assert_eq!(snapshot.current_time, 2000);

    // The jump produced an immediate position and action-mask update
    assert!(sink.entries().contains(&"pos:2000".to_string()));
    assert!(sink.entries().contains(&"mask:110".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn play_before_engine_exists_reports_not_ready() {
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for("http://127.0.0.1:9", sink.clone());

    controller.play();
    assert_eq!(sink.count("not_ready"), 1);
    assert_eq!(controller.snapshot().phase, Phase::Unstarted);
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_controls_drive_playback_to_completion() {
    let base = spawn_backend(action_body(), StreamPlan::Chunks(full_session_chunks())).await;
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for(&base, sink.clone());
    controller.load("abc123", None).await.unwrap();

    controller.play();
    assert_eq!(controller.snapshot().phase, Phase::Playing);

    controller.pause();
    assert_eq!(controller.snapshot().phase, Phase::Paused);

    // Seeking while paused moves the position but stays paused
    controller.seek(1000);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, Phase::Paused);
    assert_eq!(snapshot.current_time, 1000);

    // Jump near the end and resume; the headless engine finishes within
    // a few poll intervals
    controller.seek(3990);
    controller.play();
    timeout(Duration::from_secs(2), sink.finish_signal.notified())
        .await
        .expect("playback should finish");

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, Phase::Finished);
    assert_eq!(snapshot.current_time, 4000);
    assert_eq!(sink.count("finished"), 1);

    // Play after completion restarts from zero
    controller.play();
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, Phase::Playing);
    assert!(snapshot.current_time < 3990);
}

#[tokio::test(flavor = "multi_thread")]
async fn seek_before_load_is_silently_ignored() {
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for("http://127.0.0.1:9", sink.clone());

    controller.seek(5000);
    assert_eq!(controller.snapshot().current_time, 0);
    assert_eq!(sink.count("pos:"), 0);
    assert_eq!(sink.count("error"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn error_pinpoint_row_reaches_action_sink() {
    let base = spawn_backend(action_body(), StreamPlan::Chunks(full_session_chunks())).await;
    let sink = Arc::new(SinkLog::default());
    let config = ControllerConfig {
        // Matches the JS_ERROR row at offset 3500 in the action list
        error_log_tm: Some(3500),
        ..test_config()
    };
    let controller = controller_with_config(&base, sink.clone(), config);

    controller.load("abc123", None).await.unwrap();
    assert!(sink.entries().contains(&"pinpoint:2".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn action_click_seeks_to_action_offset() {
    let base = spawn_backend(action_body(), StreamPlan::Chunks(full_session_chunks())).await;
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for(&base, sink.clone());
    controller.load("abc123", None).await.unwrap();

    controller.action_clicked(1);
    assert_eq!(controller.snapshot().current_time, 2000);
    assert!(sink.entries().contains(&"mask:110".to_string()));

    // Out-of-range rows are ignored
    controller.action_clicked(42);
    assert_eq!(controller.snapshot().current_time, 2000);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_load_is_rejected() {
    let base = spawn_backend(action_body(), StreamPlan::Chunks(full_session_chunks())).await;
    let sink = Arc::new(SinkLog::default());
    let controller = Arc::new(controller_for(&base, sink));

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.load("abc123", None).await })
    };

    // Give the first load time to reach the streaming phase
    sleep(Duration::from_millis(30)).await;
    let err = controller.load("abc123", None).await.unwrap_err();
    assert!(matches!(err, PlayerError::LoadInProgress));

    first.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn close_is_idempotent_and_resets_state() {
    let base = spawn_backend(action_body(), StreamPlan::Chunks(full_session_chunks())).await;
    let sink = Arc::new(SinkLog::default());
    let controller = controller_for(&base, sink.clone());
    controller.load("abc123", None).await.unwrap();
    controller.play();

    controller.close();
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, Phase::Unstarted);
    assert_eq!(snapshot.current_time, 0);
    assert_eq!(snapshot.total_duration, 0);

    // Safe to repeat, and safe before any load on a fresh controller
    controller.close();
    let fresh = controller_for("http://127.0.0.1:9", Arc::new(SinkLog::default()));
    fresh.close();
}
