//! Controller task - lifecycle and orchestration
//!
//! **Responsibilities:**
//! - The actor loop: user commands, backend events, internal results,
//!   and timers, processed strictly one at a time
//! - Transition-table enforcement (`process_event`)
//! - Load/buffering timeout supervision
//! - Error entry and the one-time backend fallback
//! - Attempt teardown (stop reporting, threshold evaluation)

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, info, warn};

use vireo_common::events::{PlaybackState, PlayerEvent};
use vireo_common::time::now;

use crate::backend::{BackendEvent, PlayerBackend, ProcessBackend};
use crate::catalog::CatalogService;
use crate::controller::attempt::{Attempt, AutoplayContext, PlayParams, TrackSelection};
use crate::controller::machine::{self, PlaybackEvent};
use crate::controller::{ControllerCommand, InternalMsg, SharedPlayerState};
use crate::settings::PlayerSettings;

/// Minimum position advance past the buffering-start reading that counts
/// as meaningful progress
pub(crate) const BUFFER_PROGRESS_MS: u64 = 500;

/// Window after a segment's start within which late-arriving metadata
/// still triggers a skip
pub(crate) const SEGMENT_GRACE_MS: u64 = 5000;

pub(crate) struct ControllerTask {
    pub(crate) settings: PlayerSettings,
    pub(crate) catalog: Arc<dyn CatalogService>,
    pub(crate) backend: Box<dyn PlayerBackend>,
    pub(crate) backend_rx: broadcast::Receiver<BackendEvent>,
    command_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    pub(crate) internal_tx: mpsc::UnboundedSender<InternalMsg>,
    internal_rx: mpsc::UnboundedReceiver<InternalMsg>,
    pub(crate) shared: Arc<SharedPlayerState>,
    pub(crate) events: vireo_common::events::EventBus,
    pub(crate) http: reqwest::Client,

    pub(crate) state: PlaybackState,
    pub(crate) attempt: Option<Attempt>,
    pub(crate) attempt_counter: u64,
    pub(crate) pending_autoplay: Option<AutoplayContext>,
    pub(crate) fallback_used: bool,
    pub(crate) last_request: Option<(PlayParams, Option<TrackSelection>)>,
    /// Engine exits the controller itself requested via stop; such exit
    /// events were already handled as Stop and must not be re-handled
    pub(crate) expected_exits: u32,

    pub(crate) load_deadline: Option<Instant>,
    pub(crate) buffer_deadline: Option<Instant>,

    pub(crate) volume: f64,
    pub(crate) muted: bool,
    pub(crate) audio_delay_ms: i64,
}

impl ControllerTask {
    pub(crate) fn new(
        backend: Box<dyn PlayerBackend>,
        catalog: Arc<dyn CatalogService>,
        settings: PlayerSettings,
        shared: Arc<SharedPlayerState>,
        events: vireo_common::events::EventBus,
        command_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    ) -> Self {
        let backend_rx = backend.subscribe();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let volume = settings.volume;
        let muted = settings.muted;
        let audio_delay_ms = settings.audio_delay_ms;
        Self {
            settings,
            catalog,
            backend,
            backend_rx,
            command_rx,
            internal_tx,
            internal_rx,
            shared,
            events,
            http: reqwest::Client::new(),
            state: PlaybackState::Idle,
            attempt: None,
            attempt_counter: 0,
            pending_autoplay: None,
            fallback_used: false,
            last_request: None,
            expected_exits: 0,
            load_deadline: None,
            buffer_deadline: None,
            volume,
            muted,
            audio_delay_ms,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let next_deadline = match (self.load_deadline, self.buffer_deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };

            tokio::select! {
                maybe_command = self.command_rx.recv() => {
                    match maybe_command {
                        Some(command) => self.handle_command(command),
                        None => {
                            // Every handle dropped: shut down
                            info!("controller shutting down");
                            self.backend.stop();
                            break;
                        }
                    }
                }
                event = self.backend_rx.recv() => {
                    match event {
                        Ok(event) => self.handle_backend_event(event),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!("controller lagged behind backend, {} events lost", missed);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            // Only possible if the backend was torn down
                            // under us; resubscribe to its replacement.
                            self.backend_rx = self.backend.subscribe();
                        }
                    }
                }
                Some(message) = self.internal_rx.recv() => {
                    self.handle_internal(message);
                }
                () = async { sleep_until(next_deadline.unwrap()).await }, if next_deadline.is_some() => {
                    self.on_timeout_fired();
                }
            }
        }
    }

    /// Run one event through the transition table.
    ///
    /// Returns false (and leaves state untouched) for pairs not in the
    /// table. This is the only place playback state is mutated.
    pub(crate) fn process_event(&mut self, event: PlaybackEvent) -> bool {
        match machine::next_state(self.state, event) {
            Some(next) => {
                let old = self.state;
                info!("playback state: {} --{}--> {}", old, event, next);
                self.state = next;
                self.shared.set_state(next);
                self.events.emit(PlayerEvent::StateChanged {
                    old_state: old,
                    new_state: next,
                    timestamp: now(),
                });
                true
            }
            None => {
                debug!("event {} rejected in state {}", event, self.state);
                false
            }
        }
    }

    fn on_timeout_fired(&mut self) {
        let deadline_passed = |deadline: Option<Instant>| {
            deadline.map_or(false, |d| Instant::now() >= d)
        };
        if deadline_passed(self.load_deadline) {
            self.load_deadline = None;
            warn!("load timed out, no position update from the engine");
            self.enter_error(Some("timed out waiting for playback to start".to_string()));
        } else if deadline_passed(self.buffer_deadline) {
            self.buffer_deadline = None;
            warn!("buffering stalled, no position update from the engine");
            self.enter_error(Some("timed out waiting for buffering".to_string()));
        }
    }

    pub(crate) fn arm_load_timeout(&mut self) {
        self.load_deadline =
            Some(Instant::now() + Duration::from_millis(self.settings.load_timeout_ms));
    }

    /// (Re)arm the buffering timeout; called on entry to Buffering and on
    /// every position update while buffering, so active-but-slow
    /// buffering never times out.
    pub(crate) fn arm_buffer_timeout(&mut self) {
        self.buffer_deadline =
            Some(Instant::now() + Duration::from_millis(self.settings.buffering_timeout_ms));
    }

    pub(crate) fn cancel_timers(&mut self) {
        self.load_deadline = None;
        self.buffer_deadline = None;
    }

    /// Stop the engine, remembering that the resulting exit event was
    /// requested and already accounted for
    pub(crate) fn stop_backend(&mut self) {
        if self.backend.is_running() {
            self.expected_exits += 1;
        }
        self.backend.stop();
    }

    /// Enter the error state: stop timers and the backend, clear
    /// autoplay/prefetch context. A None message is an internal
    /// transition (backend fallback) and is not surfaced.
    pub(crate) fn enter_error(&mut self, message: Option<String>) {
        if !self.process_event(PlaybackEvent::ErrorOccurred) {
            return;
        }
        self.cancel_timers();
        self.stop_backend();
        self.pending_autoplay = None;
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.prefetched = None;
        }
        if message.is_some() {
            self.shared.set_error(message.clone());
            self.events.emit(PlayerEvent::ErrorChanged {
                message,
                timestamp: now(),
            });
        }
    }

    /// One-time runtime fallback to the process backend.
    ///
    /// Detaches from the failing backend (its event stream is discarded
    /// by replacing the subscription), instantiates the external-process
    /// backend, and retries the pending URL when a load was in progress.
    /// A second fatal becomes a user-visible error.
    pub(crate) fn fallback_to_process_backend(&mut self, reason: &str) {
        if self.fallback_used {
            self.enter_error(Some(format!("backend failed: {}", reason)));
            return;
        }
        self.fallback_used = true;
        warn!(
            "backend '{}' failed ({}), falling back to process backend",
            self.backend.name(),
            reason
        );

        let load_in_progress = !matches!(self.state, PlaybackState::Idle | PlaybackState::Error);
        let resume_ms = self.attempt.as_ref().map(|a| a.position_ms).unwrap_or(0);

        if load_in_progress {
            // Internal error transition, no user-visible message; the
            // retry below re-enters Loading immediately
            self.enter_error(None);
        }

        self.backend.stop();
        self.backend = Box::new(ProcessBackend::new());
        self.backend_rx = self.backend.subscribe();
        // The fresh subscription never sees the old engine's events
        self.expected_exits = 0;
        self.shared.set_backend_name(self.backend.name());

        if load_in_progress {
            if let Some((mut params, selection)) = self.last_request.clone() {
                if resume_ms > 0 {
                    params.start_position_ms = resume_ms;
                }
                info!("retrying pending url on process backend");
                self.handle_play(params, selection);
            }
        }
    }

    /// Tear down the current attempt on Stop/PlaybackEnd.
    ///
    /// Reports the final stopped state at most once per attempt,
    /// evaluates the completion threshold, and stashes autoplay context
    /// when it was crossed.
    pub(crate) fn finish_attempt(&mut self, event: PlaybackEvent) {
        if !self.process_event(event) {
            return;
        }
        self.cancel_timers();
        self.stop_backend();

        let Some(mut attempt) = self.attempt.take() else {
            self.reset_shared();
            return;
        };

        if !attempt.stop_reported {
            attempt.stop_reported = true;
            let catalog = Arc::clone(&self.catalog);
            let item_id = attempt.params.item_id.clone();
            let position_ms = attempt.position_ms;
            tokio::spawn(async move {
                if let Err(e) = catalog.report_stopped(&item_id, position_ms).await {
                    warn!("stop report failed: {}", e);
                }
            });
        }

        self.events.emit(PlayerEvent::Stopped {
            item_id: attempt.params.item_id.clone(),
            position_ms: attempt.position_ms,
            timestamp: now(),
        });

        if attempt.threshold_met(self.settings.completion_threshold_percent)
            && !attempt.params.series_id.is_empty()
        {
            info!(
                "completion threshold met at {}ms / {}ms",
                attempt.position_ms, attempt.duration_ms
            );
            self.pending_autoplay = Some(attempt.autoplay_context());
            self.resolve_next_episode(&attempt);
        } else {
            self.pending_autoplay = None;
        }

        self.reset_shared();
    }

    pub(crate) fn reset_shared(&self) {
        self.shared.set_position_ms(0);
        self.shared.set_duration_ms(0);
        self.shared.set_paused(false);
        self.shared.set_buffering(false);
        self.shared.set_item_id(None);
        self.shared.set_trickplay(None);
    }
}
