//! External-process backend
//!
//! Wraps the engine process/IPC manager. Also hosts the engine-backed
//! core shared with the embedded backend: both drive the same engine
//! binary, differing only in how video reaches the screen.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::backend::{BackendEvent, PlayerBackend};
use crate::engine::{EngineEvent, EngineLaunch, EngineManager};
use crate::error::Result;
use crate::protocol::{ObservedProperty, WireValue};

/// One live engine spawn plus the flag gating its event forwarder
struct ActiveEngine {
    manager: EngineManager,
    /// Cleared when this spawn is superseded so late events from the old
    /// engine never reach the shared stream
    forwarding: Arc<AtomicBool>,
}

/// Engine-backed backend core shared by the process and embedded variants
///
/// Owns the stable event stream (one per backend instance, surviving
/// engine restarts) and the current engine slot.
pub(crate) struct EngineBackendCore {
    event_tx: broadcast::Sender<BackendEvent>,
    slot: Mutex<Option<ActiveEngine>>,
}

impl EngineBackendCore {
    pub(crate) fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            event_tx,
            slot: Mutex::new(None),
        }
    }

    /// Start a fresh engine, superseding any previous spawn
    pub(crate) fn start_engine(
        &self,
        engine_binary: &Path,
        args: Vec<String>,
        media_url: &str,
    ) -> Result<()> {
        let (manager, engine_rx) = EngineManager::start(EngineLaunch {
            binary: engine_binary.to_path_buf(),
            args,
            media_url: media_url.to_string(),
            socket_path: None,
        })?;

        let forwarding = Arc::new(AtomicBool::new(true));
        tokio::spawn(forward_events(
            engine_rx,
            self.event_tx.clone(),
            Arc::clone(&forwarding),
        ));

        let mut slot = self.slot.lock().expect("backend slot poisoned");
        if let Some(old) = slot.take() {
            // Unsubscribe the old spawn before stopping it so its exit
            // event cannot race into the new session.
            old.forwarding.store(false, Ordering::Release);
            old.manager.stop();
        }
        *slot = Some(ActiveEngine { manager, forwarding });
        Ok(())
    }

    pub(crate) fn stop_engine(&self) {
        let slot = self.slot.lock().expect("backend slot poisoned");
        if let Some(active) = slot.as_ref() {
            // Forwarding stays on: the controller needs the Exited event.
            active.manager.stop();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        let slot = self.slot.lock().expect("backend slot poisoned");
        slot.as_ref().map_or(false, |a| a.manager.is_running())
    }

    pub(crate) fn send(&self, tokens: Vec<WireValue>) {
        let slot = self.slot.lock().expect("backend slot poisoned");
        match slot.as_ref() {
            Some(active) => active.manager.send(tokens),
            None => warn!("dropping command, no engine started"),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: BackendEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Forward one spawn's engine events into the backend's stable stream
async fn forward_events(
    mut engine_rx: broadcast::Receiver<EngineEvent>,
    event_tx: broadcast::Sender<BackendEvent>,
    forwarding: Arc<AtomicBool>,
) {
    loop {
        let event = match engine_rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("backend event forwarder lagged, {} events lost", missed);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if !forwarding.load(Ordering::Acquire) {
            debug!("discarding event from superseded engine: {:?}", event);
            if matches!(event, EngineEvent::Exited { .. }) {
                break;
            }
            continue;
        }
        let done = matches!(event, EngineEvent::Exited { .. });
        if let Some(translated) = translate_engine_event(event) {
            let _ = event_tx.send(translated);
        }
        if done {
            break;
        }
    }
}

/// Map a typed engine event onto the backend event vocabulary
pub(crate) fn translate_engine_event(event: EngineEvent) -> Option<BackendEvent> {
    match event {
        EngineEvent::Connected => None,
        EngineEvent::Property { property, data } => match property {
            ObservedProperty::Position => {
                data.and_then(|d| d.as_f64()).map(BackendEvent::PositionChanged)
            }
            ObservedProperty::Duration => {
                data.and_then(|d| d.as_f64()).map(BackendEvent::DurationChanged)
            }
            ObservedProperty::Pause => {
                data.and_then(|d| d.as_bool()).map(BackendEvent::PauseChanged)
            }
            ObservedProperty::AudioTrack => Some(BackendEvent::AudioTrackChanged(
                data.and_then(|d| d.as_track_id()),
            )),
            ObservedProperty::SubtitleTrack => Some(BackendEvent::SubtitleTrackChanged(
                data.and_then(|d| d.as_track_id()),
            )),
            ObservedProperty::Buffering => {
                data.and_then(|d| d.as_bool()).map(BackendEvent::BufferingChanged)
            }
            ObservedProperty::Volume => {
                data.and_then(|d| d.as_f64()).map(BackendEvent::VolumeChanged)
            }
            ObservedProperty::Mute => {
                data.and_then(|d| d.as_bool()).map(BackendEvent::MuteChanged)
            }
        },
        EngineEvent::EndFile => Some(BackendEvent::PlaybackEnded),
        EngineEvent::ScriptMessage(args) => Some(BackendEvent::ScriptMessage(args)),
        EngineEvent::Exited { clean } => Some(BackendEvent::Exited { clean }),
    }
}

/// Backend that runs the engine as a standalone windowed process
pub struct ProcessBackend {
    core: EngineBackendCore,
}

impl ProcessBackend {
    pub fn new() -> Self {
        Self {
            core: EngineBackendCore::new(),
        }
    }
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerBackend for ProcessBackend {
    fn name(&self) -> &'static str {
        "process"
    }

    fn start(&self, engine_binary: &Path, extra_args: &[String], media_url: &str) -> Result<()> {
        let mut args = vec!["--no-terminal".to_string()];
        args.extend_from_slice(extra_args);
        self.core.start_engine(engine_binary, args, media_url)
    }

    fn stop(&self) {
        self.core.stop_engine();
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn send_typed_command(&self, tokens: Vec<WireValue>) {
        self.core.send(tokens);
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.core.subscribe()
    }
}
