// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The replay stream controller
//!
//! `ReplayStreamController` drives one playback session end to end: the
//! upfront action-list request, the chunked event stream, progressive
//! engine construction once enough events have arrived, and the transport
//! controls afterwards. All mutation happens behind one mutex; sink
//! notifications are emitted after the lock is released so a sink is free
//! to call back into the controller.

use sl_api_contract::{RecordedEvent, SessionQuery};
use sl_rest_client::ReplayClient;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::actions::ActionTracker;
use crate::engine::{EngineCallbacks, EngineConfig, EngineWarning, ReplayEngine, ReplayEngineFactory};
use crate::error::{PlayerError, PlayerResult};
use crate::playback::{Phase, PlayTransition, PlaybackState};
use crate::scale::fit_scale;
use crate::session::StreamSession;
use crate::sinks::{ActionSink, ProgressSink, ShellSink};
use crate::warnings::WarningFilter;

use futures::StreamExt;

/// Controller construction parameters
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Monitored package forwarded with every backend query
    pub package_name: String,
    /// Backend server type discriminator
    pub server_type: String,
    /// Playback container dimensions, for viewport scaling
    pub container: (u32, u32),
    /// Auto-scroll the action list to the most recently completed row
    pub auto_scroll: bool,
    /// Relative offset of an error row to pinpoint-mark, if any
    pub error_log_tm: Option<i64>,
    /// Progress polling cadence while playing
    pub poll_interval: Duration,
    pub warning_filter: WarningFilter,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            package_name: String::new(),
            server_type: String::new(),
            container: (1280, 720),
            auto_scroll: true,
            error_log_tm: None,
            poll_interval: Duration::from_millis(100),
            warning_filter: WarningFilter::default(),
        }
    }
}

/// Read-only view of the playback state, for frontends and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub phase: Phase,
    pub current_time: i64,
    pub total_duration: i64,
}

struct ControllerState {
    playback: PlaybackState,
    session: Option<StreamSession>,
    actions: Option<ActionTracker>,
    engine: Option<Box<dyn ReplayEngine>>,
    loading: bool,
    poll: Option<JoinHandle<()>>,
}

/// Owns the lifecycle of one session-replay playback
pub struct ReplayStreamController {
    client: ReplayClient,
    factory: Arc<dyn ReplayEngineFactory>,
    shell: Arc<dyn ShellSink>,
    progress: Arc<dyn ProgressSink>,
    action_sink: Arc<dyn ActionSink>,
    config: ControllerConfig,
    state: Arc<Mutex<ControllerState>>,
    closed: watch::Sender<bool>,
    finished_tx: mpsc::UnboundedSender<()>,
    warnings_tx: mpsc::UnboundedSender<EngineWarning>,
    finish_task: Mutex<Option<JoinHandle<()>>>,
    warning_task: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayStreamController {
    pub fn new(
        client: ReplayClient,
        factory: Arc<dyn ReplayEngineFactory>,
        shell: Arc<dyn ShellSink>,
        progress: Arc<dyn ProgressSink>,
        action_sink: Arc<dyn ActionSink>,
        config: ControllerConfig,
    ) -> Self {
        let state = Arc::new(Mutex::new(ControllerState {
            playback: PlaybackState::idle(),
            session: None,
            actions: None,
            engine: None,
            loading: false,
            poll: None,
        }));

        let (closed, _) = watch::channel(false);
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let (warnings_tx, warnings_rx) = mpsc::unbounded_channel();

        let finish_task = spawn_finish_task(
            finished_rx,
            Arc::clone(&state),
            Arc::clone(&shell),
            Arc::clone(&progress),
            Arc::clone(&action_sink),
        );
        let warning_task = spawn_warning_task(warnings_rx, config.warning_filter.clone());

        Self {
            client,
            factory,
            shell,
            progress,
            action_sink,
            config,
            state,
            closed,
            finished_tx,
            warnings_tx,
            finish_task: Mutex::new(Some(finish_task)),
            warning_task: Mutex::new(Some(warning_task)),
        }
    }

    /// Load a session: fetch the action list, then consume the event
    /// stream to the end. Resolves once the stream completes or fails;
    /// playback may have been started by the caller long before that.
    pub async fn load(
        &self,
        session_id: &str,
        play_start_time_abs: Option<i64>,
    ) -> PlayerResult<()> {
        {
            let mut st = self.state.lock().unwrap();
            if st.loading {
                return Err(PlayerError::LoadInProgress);
            }
            st.loading = true;
        }

        let result = self.run_load(session_id, play_start_time_abs).await;

        self.state.lock().unwrap().loading = false;

        if let Err(err) = &result {
            if !matches!(err, PlayerError::Closed) {
                // A partially delivered session is never offered for
                // playback; the engine built mid-stream goes away with it
                self.teardown_session();
                self.progress.load_complete();
                self.shell.error(&err.to_string());
            }
        }
        result
    }

    async fn run_load(
        &self,
        session_id: &str,
        play_start_time_abs: Option<i64>,
    ) -> PlayerResult<()> {
        let query = SessionQuery {
            session_id: session_id.to_string(),
            package_nm: self.config.package_name.clone(),
            server_type: self.config.server_type.clone(),
            index: 0,
        };

        let response = self.client.action_list(&query).await?;
        let window = response.window()?;

        let pinpoint = {
            let mut st = self.state.lock().unwrap();
            st.session = Some(StreamSession::new(window));
            st.actions = Some(ActionTracker::new(
                response.action_list,
                self.config.error_log_tm,
                self.config.auto_scroll,
            ));
            st.playback = PlaybackState::new(window.duration_ms());
            st.actions.as_ref().and_then(ActionTracker::pinpoint)
        };
        self.action_sink.pinpoint(pinpoint);

        let mut stream = self.client.stream_events(&query).await?;
        let mut closed_rx = self.closed.subscribe();
        if *closed_rx.borrow() {
            stream.abort();
            return Err(PlayerError::Closed);
        }

        loop {
            tokio::select! {
                _ = closed_rx.changed() => {
                    stream.abort();
                    return Err(PlayerError::Closed);
                }
                item = stream.next() => match item {
                    None => break,
                    Some(Ok(event)) => self.ingest(event, play_start_time_abs)?,
                    Some(Err(source)) => {
                        // Partial delivery is a hard failure; the decoded
                        // prefix is not offered for playback
                        let events_decoded = self
                            .state
                            .lock()
                            .unwrap()
                            .session
                            .as_ref()
                            .map_or(0, StreamSession::len);
                        return Err(if events_decoded == 0 {
                            PlayerError::Transport(source)
                        } else {
                            PlayerError::StreamInterrupted {
                                events_decoded,
                                source,
                            }
                        });
                    }
                },
            }
        }

        let newly_ready = {
            let mut st = self.state.lock().unwrap();
            let session = st.session.as_mut().expect("session exists during load");
            if session.is_empty() {
                return Err(PlayerError::NoSessionData);
            }
            // Arrival order and timestamp order can diverge; the
            // authoritative sequence is timestamp-sorted once complete
            session.finalize();

            if !session.engine_initialized() {
                self.build_engine(&mut st)?;
                st.session.as_mut().unwrap().mark_engine_initialized();
                true
            } else {
                false
            }
        };

        self.progress.load_complete();
        if newly_ready {
            self.shell.ready();
        }
        tracing::info!(session_id, "replay stream loaded");
        Ok(())
    }

    /// Handle one decoded event arriving off the stream
    fn ingest(&self, event: RecordedEvent, play_start_time_abs: Option<i64>) -> PlayerResult<()> {
        let mut load_pct = None;
        let mut seek_update = None;
        let mut newly_ready = false;

        {
            let mut st = self.state.lock().unwrap();
            let session = st.session.as_mut().expect("session exists during load");
            let event_ts = event.timestamp;
            session.record(event.clone());
            load_pct = Some(session.load_progress_percent(event_ts));

            // One-time jump near the caller's point of interest, honored as
            // soon as the stream has caught up past it. The position is
            // recorded even before the engine exists; the eventual play
            // transition carries it into the engine.
            if let Some(abs) = play_start_time_abs {
                if !session.initial_seek_honored() && event_ts > abs {
                    session.mark_initial_seek_honored();
                    let target = session.window().relative(abs);
                    let clamped = st.playback.seek(target, Instant::now());
                    let was_playing = st.playback.is_playing();
                    if let Some(engine) = st.engine.as_mut() {
                        engine.seek(clamped);
                        if !was_playing {
                            engine.pause();
                        }
                    }
                    seek_update = Some(PositionUpdate {
                        percent: st.playback.progress_percent(),
                        current_ms: clamped,
                        mask: st.actions.as_ref().map(|a| {
                            (a.completed_mask(clamped), a.scroll_target(clamped))
                        }),
                    });
                }
            }

            let session = st.session.as_mut().expect("session exists during load");
            if session.engine_initialized() {
                if let Some(engine) = st.engine.as_mut() {
                    engine.add_event(event);
                }
            } else if session.ready_for_engine() {
                self.build_engine(&mut st)?;
                st.session.as_mut().unwrap().mark_engine_initialized();
                newly_ready = true;
            }
        }

        if let Some(pct) = load_pct {
            self.progress.load_progress(pct);
            if pct >= 100 {
                self.progress.load_complete();
            }
        }
        if let Some(update) = seek_update {
            self.emit_position(update);
        }
        if newly_ready {
            self.shell.ready();
        }
        Ok(())
    }

    /// Construct the engine from the events accumulated so far, tearing
    /// down any previous instance first
    fn build_engine(&self, st: &mut ControllerState) -> PlayerResult<()> {
        if let Some(mut old) = st.engine.take() {
            if old.destroy().is_err() {
                old.pause();
            }
        }

        let session = st.session.as_ref().expect("session exists during load");
        let viewport = session
            .meta_event()
            .and_then(RecordedEvent::viewport)
            .unwrap_or(self.config.container);
        let scale = fit_scale(viewport, self.config.container);

        let config = EngineConfig {
            viewport,
            scale,
            callbacks: EngineCallbacks {
                finished: self.finished_tx.clone(),
                warnings: self.warnings_tx.clone(),
            },
        };

        let engine = self
            .factory
            .build(config, session.events().to_vec())
            .map_err(|err| PlayerError::EngineInit(err.to_string()))?;
        st.engine = Some(engine);
        tracing::debug!(events = session.len(), ?viewport, scale, "replay engine constructed");
        Ok(())
    }

    /// Start, resume or restart playback. Reports a not-ready condition
    /// and changes nothing when the engine does not exist yet.
    pub fn play(&self) {
        let started = {
            let mut st = self.state.lock().unwrap();
            if st.engine.is_none() {
                None
            } else {
                let transition = st.playback.play(Instant::now());
                let engine = st.engine.as_mut().unwrap();
                match transition {
                    PlayTransition::Start { at_ms } | PlayTransition::Resume { at_ms } => {
                        engine.play(Some(at_ms));
                    }
                    PlayTransition::Restart => engine.play(Some(0)),
                    PlayTransition::NoOp => return,
                }
                if st.poll.is_none() {
                    st.poll = Some(self.spawn_poll());
                }
                Some(transition)
            }
        };

        match started {
            None => self.shell.not_ready(),
            Some(transition) => tracing::debug!(?transition, "playback started"),
        }
    }

    /// Pause playback; a no-op unless currently playing
    pub fn pause(&self) {
        let mut st = self.state.lock().unwrap();
        if st.playback.pause() {
            if let Some(engine) = st.engine.as_mut() {
                engine.pause();
            }
            if let Some(poll) = st.poll.take() {
                poll.abort();
            }
        }
    }

    /// Jump to a relative offset. Silently ignored before the engine
    /// exists or while the session has zero duration; never starts or
    /// stops playback.
    pub fn seek(&self, target_relative_ms: i64) {
        let update = {
            let mut st = self.state.lock().unwrap();
            self.apply_seek_locked(&mut st, target_relative_ms)
        };
        if let Some(update) = update {
            self.emit_position(update);
        }
    }

    /// Seek driven by a click on an action-list row
    pub fn action_clicked(&self, index: usize) {
        let target = {
            let st = self.state.lock().unwrap();
            st.actions.as_ref().and_then(|a| a.seek_target(index))
        };
        if let Some(target) = target {
            self.seek(target);
        }
    }

    fn apply_seek_locked(
        &self,
        st: &mut ControllerState,
        target_relative_ms: i64,
    ) -> Option<PositionUpdate> {
        if st.engine.is_none() || st.playback.total_duration() == 0 {
            return None;
        }

        let clamped = st.playback.seek(target_relative_ms, Instant::now());
        let was_playing = st.playback.is_playing();
        let engine = st.engine.as_mut().unwrap();
        engine.seek(clamped);
        if !was_playing {
            // Jump, then immediately hold: seeking never resumes playback
            engine.pause();
        }

        Some(PositionUpdate {
            percent: st.playback.progress_percent(),
            current_ms: clamped,
            mask: st.actions.as_ref().map(|a| {
                (a.completed_mask(clamped), a.scroll_target(clamped))
            }),
        })
    }

    fn emit_position(&self, update: PositionUpdate) {
        self.progress.playback_progress(update.percent, update.current_ms);
        if let Some((mask, scroll)) = update.mask {
            self.action_sink.mark_completed(&mask, scroll);
        }
    }

    fn spawn_poll(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let progress = Arc::clone(&self.progress);
        let action_sink = Arc::clone(&self.action_sink);
        let interval = self.config.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;

                // A stale tick after pause/finish observes the flags and
                // does nothing, rather than relying on precise cancellation
                let update = {
                    let mut st = state.lock().unwrap();
                    if !st.playback.is_playing() || st.playback.is_paused() {
                        continue;
                    }
                    let engine_pos = st.engine.as_mut().and_then(|e| e.current_time());
                    let current = st.playback.tick(engine_pos, Instant::now());
                    PositionUpdate {
                        percent: st.playback.progress_percent(),
                        current_ms: current,
                        mask: st.actions.as_ref().map(|a| {
                            (a.completed_mask(current), a.scroll_target(current))
                        }),
                    }
                };

                progress.playback_progress(update.percent, update.current_ms);
                if let Some((mask, scroll)) = update.mask {
                    action_sink.mark_completed(&mask, scroll);
                }
            }
        })
    }

    /// Current playback state, for frontends and tests
    pub fn snapshot(&self) -> PlaybackSnapshot {
        let st = self.state.lock().unwrap();
        PlaybackSnapshot {
            phase: st.playback.phase(),
            current_time: st.playback.current_time(),
            total_duration: st.playback.total_duration(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().unwrap().loading
    }

    /// Tear everything down: abort an in-flight stream, stop polling,
    /// destroy the engine and clear all per-session state. Idempotent and
    /// safe to call even if `load` never ran.
    pub fn close(&self) {
        self.closed.send_replace(true);
        self.teardown_session();

        // The warning filter and finish listener are removed exactly once
        if let Some(task) = self.finish_task.lock().unwrap().take() {
            task.abort();
        }
        if let Some(task) = self.warning_task.lock().unwrap().take() {
            task.abort();
        }
    }
}

impl ReplayStreamController {
    fn teardown_session(&self) {
        let mut st = self.state.lock().unwrap();
        if let Some(poll) = st.poll.take() {
            poll.abort();
        }
        if let Some(mut engine) = st.engine.take() {
            if engine.destroy().is_err() {
                engine.pause();
            }
        }
        st.session = None;
        st.actions = None;
        st.playback.reset();
    }
}

impl Drop for ReplayStreamController {
    fn drop(&mut self) {
        self.close();
    }
}

struct PositionUpdate {
    percent: f64,
    current_ms: i64,
    mask: Option<(Vec<bool>, Option<usize>)>,
}

fn spawn_finish_task(
    mut finished_rx: mpsc::UnboundedReceiver<()>,
    state: Arc<Mutex<ControllerState>>,
    shell: Arc<dyn ShellSink>,
    progress: Arc<dyn ProgressSink>,
    action_sink: Arc<dyn ActionSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while finished_rx.recv().await.is_some() {
            let update = {
                let mut st = state.lock().unwrap();
                if st.engine.is_none() {
                    // Finish raced with teardown
                    continue;
                }
                st.playback.finish();
                if let Some(poll) = st.poll.take() {
                    poll.abort();
                }
                let duration = st.playback.total_duration();
                let mask = st.actions.as_ref().map(|a| {
                    (a.completed_mask(duration), a.scroll_target(duration))
                });
                (duration, mask)
            };

            let (duration, mask) = update;
            progress.playback_progress(100.0, duration);
            if let Some((mask, scroll)) = mask {
                action_sink.mark_completed(&mask, scroll);
            }
            shell.finished();
        }
    })
}

fn spawn_warning_task(
    mut warnings_rx: mpsc::UnboundedReceiver<EngineWarning>,
    filter: WarningFilter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(warning) = warnings_rx.recv().await {
            filter.report(&warning);
        }
    })
}
