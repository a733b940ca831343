//! Playback controller
//!
//! The orchestration core: a single actor task owns all mutable playback
//! state and processes user commands, backend events, catalog results,
//! and timers strictly one at a time, so every state transition is
//! serialized through the transition table. The public `PlayerController`
//! handle is a thin message sender plus lock-free snapshots.

pub mod attempt;
pub mod machine;

mod core;
mod playback;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, mpsc};

use vireo_common::events::{EventBus, PlaybackState, PlayerEvent};
use vireo_common::types::{EpisodeRef, MediaSegment};

use crate::backend::PlayerBackend;
use crate::catalog::CatalogService;
use crate::settings::PlayerSettings;
use crate::trickplay::{PreviewFrame, TrickplayIndex};

pub use self::attempt::{PlayParams, TrackSelection};
pub use self::machine::PlaybackEvent;

use self::attempt::PrefetchedEpisode;
use self::core::ControllerTask;

/// User commands into the controller task
#[derive(Debug)]
pub(crate) enum ControllerCommand {
    Play {
        params: PlayParams,
        selection: Option<TrackSelection>,
    },
    Stop,
    Pause,
    Resume,
    TogglePause,
    Seek { position_ms: u64 },
    SeekRelative { delta_ms: i64 },
    SetAudioTrack { catalog_index: i64 },
    SetSubtitleTrack { catalog_index: i64 },
    SetVolume { volume: f64 },
    SetMuted { muted: bool },
    Retry,
    ClearError,
}

/// Results of spawned async work, routed back onto the controller task
#[derive(Debug)]
pub(crate) enum InternalMsg {
    SegmentsResolved {
        attempt_id: u64,
        segments: Vec<MediaSegment>,
    },
    TrickplayBuilt {
        attempt_id: u64,
        index: TrickplayIndex,
    },
    TrickplayFailed {
        attempt_id: u64,
        message: String,
    },
    PrefetchResolved {
        attempt_id: u64,
        prefetched: PrefetchedEpisode,
    },
    NextEpisodeResolved {
        for_item_id: String,
        episode: Option<EpisodeRef>,
    },
    NextStreamResolved {
        episode: EpisodeRef,
        url: String,
    },
}

/// Lock-free/shared snapshots readable without touching the actor
///
/// Written only by the controller task; read by any thread.
pub struct SharedPlayerState {
    state: RwLock<PlaybackState>,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
    paused: AtomicBool,
    buffering: AtomicBool,
    volume_percent: AtomicU64,
    muted: AtomicBool,
    error: RwLock<Option<String>>,
    item_id: RwLock<Option<String>>,
    backend_name: RwLock<&'static str>,
    trickplay: RwLock<Option<TrickplayIndex>>,
}

impl SharedPlayerState {
    fn new(backend_name: &'static str, volume: f64) -> Self {
        Self {
            state: RwLock::new(PlaybackState::Idle),
            position_ms: AtomicU64::new(0),
            duration_ms: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            buffering: AtomicBool::new(false),
            volume_percent: AtomicU64::new(volume.clamp(0.0, 100.0) as u64),
            muted: AtomicBool::new(false),
            error: RwLock::new(None),
            item_id: RwLock::new(None),
            backend_name: RwLock::new(backend_name),
            trickplay: RwLock::new(None),
        }
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.read().expect("state lock poisoned")
    }

    pub(crate) fn set_state(&self, state: PlaybackState) {
        *self.state.write().expect("state lock poisoned") = state;
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn set_position_ms(&self, position_ms: u64) {
        self.position_ms.store(position_ms, Ordering::Relaxed);
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn set_duration_ms(&self, duration_ms: u64) {
        self.duration_ms.store(duration_ms, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering.load(Ordering::Relaxed)
    }

    pub(crate) fn set_buffering(&self, buffering: bool) {
        self.buffering.store(buffering, Ordering::Relaxed);
    }

    pub fn volume(&self) -> f64 {
        self.volume_percent.load(Ordering::Relaxed) as f64
    }

    pub(crate) fn set_volume(&self, volume: f64) {
        self.volume_percent
            .store(volume.clamp(0.0, 100.0) as u64, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub(crate) fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub fn error(&self) -> Option<String> {
        self.error.read().expect("error lock poisoned").clone()
    }

    pub(crate) fn set_error(&self, error: Option<String>) {
        *self.error.write().expect("error lock poisoned") = error;
    }

    pub fn item_id(&self) -> Option<String> {
        self.item_id.read().expect("item lock poisoned").clone()
    }

    pub(crate) fn set_item_id(&self, item_id: Option<String>) {
        *self.item_id.write().expect("item lock poisoned") = item_id;
    }

    pub fn backend_name(&self) -> &'static str {
        *self.backend_name.read().expect("backend name lock poisoned")
    }

    pub(crate) fn set_backend_name(&self, name: &'static str) {
        *self.backend_name.write().expect("backend name lock poisoned") = name;
    }

    pub(crate) fn set_trickplay(&self, index: Option<TrickplayIndex>) {
        let mut slot = self.trickplay.write().expect("trickplay lock poisoned");
        if let Some(old) = slot.take() {
            // Blobs are per-attempt temp files; drop the superseded one
            let _ = std::fs::remove_file(old.file_path());
        }
        *slot = index;
    }

    /// Resolve a scrub-preview request against the built trickplay blob
    ///
    /// Returns None when no blob exists for the current item or the
    /// position maps to the frame already produced.
    pub fn preview_frame(&self, position_ms: u64) -> Option<PreviewFrame> {
        self.trickplay
            .write()
            .expect("trickplay lock poisoned")
            .as_mut()
            .and_then(|index| index.preview_frame(position_ms))
    }
}

/// Handle to the playback controller actor
#[derive(Clone)]
pub struct PlayerController {
    command_tx: mpsc::UnboundedSender<ControllerCommand>,
    shared: Arc<SharedPlayerState>,
    events: EventBus,
}

impl PlayerController {
    /// Create a controller owning the given backend and spawn its task
    pub fn new(
        backend: Box<dyn PlayerBackend>,
        catalog: Arc<dyn CatalogService>,
        settings: PlayerSettings,
    ) -> Self {
        let shared = Arc::new(SharedPlayerState::new(backend.name(), settings.volume));
        let events = EventBus::new(256);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = ControllerTask::new(
            backend,
            catalog,
            settings,
            Arc::clone(&shared),
            events.clone(),
            command_rx,
        );
        tokio::spawn(task.run());

        Self {
            command_tx,
            shared,
            events,
        }
    }

    fn send(&self, command: ControllerCommand) {
        // The task outlives every handle; failure means shutdown is
        // already underway and the command is moot.
        let _ = self.command_tx.send(command);
    }

    /// Start playback of a URL
    pub fn play_url(&self, params: PlayParams) {
        self.send(ControllerCommand::Play {
            params,
            selection: None,
        });
    }

    /// Start playback with explicit track selection and resolved maps
    pub fn play_url_with_tracks(&self, params: PlayParams, selection: TrackSelection) {
        self.send(ControllerCommand::Play {
            params,
            selection: Some(selection),
        });
    }

    pub fn stop(&self) {
        self.send(ControllerCommand::Stop);
    }

    pub fn pause(&self) {
        self.send(ControllerCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(ControllerCommand::Resume);
    }

    pub fn toggle_pause(&self) {
        self.send(ControllerCommand::TogglePause);
    }

    /// Seek to an absolute position
    pub fn seek(&self, position_ms: u64) {
        self.send(ControllerCommand::Seek { position_ms });
    }

    /// Seek by a signed delta
    pub fn seek_relative(&self, delta_ms: i64) {
        self.send(ControllerCommand::SeekRelative { delta_ms });
    }

    /// Select an audio track by catalog stream index
    pub fn set_selected_audio_track(&self, catalog_index: i64) {
        self.send(ControllerCommand::SetAudioTrack { catalog_index });
    }

    /// Select a subtitle track by catalog stream index; -1 disables
    pub fn set_selected_subtitle_track(&self, catalog_index: i64) {
        self.send(ControllerCommand::SetSubtitleTrack { catalog_index });
    }

    pub fn set_volume(&self, volume: f64) {
        self.send(ControllerCommand::SetVolume { volume });
    }

    pub fn set_muted(&self, muted: bool) {
        self.send(ControllerCommand::SetMuted { muted });
    }

    /// Retry the last failed load
    pub fn retry(&self) {
        self.send(ControllerCommand::Retry);
    }

    /// Leave the error state without retrying
    pub fn clear_error(&self) {
        self.send(ControllerCommand::ClearError);
    }

    /// Subscribe to player events
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Shared snapshots (state, position, error, trickplay previews)
    pub fn snapshot(&self) -> &SharedPlayerState {
        &self.shared
    }
}
