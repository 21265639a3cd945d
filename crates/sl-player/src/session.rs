// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-load stream decode state

use sl_api_contract::{RecordedEvent, SessionWindow};

/// Minimum number of decoded events before the engine is constructed
/// mid-stream. A meta event must also have arrived so the viewport is known.
pub const MIN_EVENTS_FOR_ENGINE: usize = 5;

/// Decode state for one in-progress session fetch
///
/// Events are appended in arrival order, which is not necessarily timestamp
/// order until `finalize` runs. The session window comes from the upfront
/// action-list request, not from the stream itself.
#[derive(Debug)]
pub struct StreamSession {
    window: SessionWindow,
    events: Vec<RecordedEvent>,
    earliest_ts: Option<i64>,
    latest_ts: Option<i64>,
    meta_seen: bool,
    engine_initialized: bool,
    initial_seek_honored: bool,
}

impl StreamSession {
    pub fn new(window: SessionWindow) -> Self {
        Self {
            window,
            events: Vec::new(),
            earliest_ts: None,
            latest_ts: None,
            meta_seen: false,
            engine_initialized: false,
            initial_seek_honored: false,
        }
    }

    pub fn window(&self) -> SessionWindow {
        self.window
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Record one decoded event in arrival order
    pub fn record(&mut self, event: RecordedEvent) {
        if event.is_meta() {
            self.meta_seen = true;
        }
        let ts = event.timestamp;
        self.earliest_ts = Some(self.earliest_ts.map_or(ts, |prev| prev.min(ts)));
        self.latest_ts = Some(self.latest_ts.map_or(ts, |prev| prev.max(ts)));
        self.events.push(event);
    }

    /// Whether enough has arrived to construct the engine mid-stream:
    /// at least one meta event plus `MIN_EVENTS_FOR_ENGINE` events total
    pub fn ready_for_engine(&self) -> bool {
        self.meta_seen && self.events.len() >= MIN_EVENTS_FOR_ENGINE
    }

    pub fn engine_initialized(&self) -> bool {
        self.engine_initialized
    }

    pub fn mark_engine_initialized(&mut self) {
        self.engine_initialized = true;
    }

    pub fn initial_seek_honored(&self) -> bool {
        self.initial_seek_honored
    }

    pub fn mark_initial_seek_honored(&mut self) {
        self.initial_seek_honored = true;
    }

    /// The meta event carrying the recorded viewport, if one arrived
    pub fn meta_event(&self) -> Option<&RecordedEvent> {
        self.events.iter().find(|event| event.is_meta())
    }

    /// Coarse load progress for one arriving event, as a percentage of the
    /// session window
    pub fn load_progress_percent(&self, event_ts: i64) -> u8 {
        let duration = self.window.duration_ms();
        if duration == 0 {
            return 100;
        }
        let relative = self.window.relative(event_ts);
        ((relative * 100) / duration).clamp(0, 100) as u8
    }

    /// Stable sort into timestamp order, applied once the stream completes.
    /// Arrival order and timestamp order can diverge because the transport
    /// favors forwarding events as they arrive.
    pub fn finalize(&mut self) {
        self.events.sort_by_key(|event| event.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: i64, timestamp: i64) -> RecordedEvent {
        serde_json::from_value(json!({"type": event_type, "timestamp": timestamp})).unwrap()
    }

    fn meta(timestamp: i64) -> RecordedEvent {
        serde_json::from_value(json!({
            "type": 4,
            "timestamp": timestamp,
            "data": {"width": 800, "height": 600}
        }))
        .unwrap()
    }

    fn session() -> StreamSession {
        StreamSession::new(SessionWindow::new(1000, 5000).unwrap())
    }

    #[test]
    fn readiness_requires_meta_and_five_events() {
        let mut session = session();
        for i in 0..5 {
            session.record(event(2, 1000 + i));
        }
        // Five events but no meta
        assert!(!session.ready_for_engine());

        session.record(meta(1005));
        assert!(session.ready_for_engine());
    }

    #[test]
    fn meta_alone_is_not_enough() {
        let mut session = session();
        session.record(meta(1000));
        session.record(event(2, 1001));
        assert!(!session.ready_for_engine());
    }

    #[test]
    fn load_progress_tracks_window() {
        let session = session();
        assert_eq!(session.load_progress_percent(1000), 0);
        assert_eq!(session.load_progress_percent(3000), 50);
        assert_eq!(session.load_progress_percent(5000), 100);
        // Timestamps past the window clamp to 100
        assert_eq!(session.load_progress_percent(9000), 100);
    }

    #[test]
    fn finalize_sorts_by_timestamp_stably() {
        let mut session = session();
        session.record(event(2, 1200));
        session.record(event(3, 1100));
        session.record(event(2, 1100));
        session.finalize();

        let timestamps: Vec<i64> = session.events().iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![1100, 1100, 1200]);
        // Stable: the type-3 event arrived before the second 1100 event
        assert_eq!(session.events()[0].event_type, 3);
        assert_eq!(session.events()[1].event_type, 2);
    }

    #[test]
    fn meta_event_lookup() {
        let mut session = session();
        session.record(event(2, 1000));
        assert!(session.meta_event().is_none());
        session.record(meta(1001));
        assert_eq!(session.meta_event().unwrap().viewport(), Some((800, 600)));
    }
}
