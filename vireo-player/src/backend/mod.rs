//! Player backend abstraction
//!
//! A backend implements engine control: starting and stopping the engine,
//! submitting commands, and surfacing a typed event stream. All variants
//! expose identical lifecycle/command/event semantics so the playback
//! controller stays backend-agnostic; embedded-video support is an
//! explicit capability query, not a downcast.

pub mod embedded;
pub mod process;

use std::path::Path;

use tokio::sync::broadcast;
use tracing::warn;

use crate::error::{Error, Result};
use crate::protocol::WireValue;

pub use embedded::EmbeddedBackend;
pub use process::ProcessBackend;

/// Named class of unrecoverable backend conditions
///
/// A fatal event triggers the controller's one-time fallback to the
/// process backend; it is not surfaced to the user unless the fallback
/// also fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    /// The embedded backend has no render surface to draw into
    RenderContextUnavailable,
}

impl std::fmt::Display for FatalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalKind::RenderContextUnavailable => write!(f, "render context unavailable"),
        }
    }
}

/// Typed events from a backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Playback position in seconds
    PositionChanged(f64),
    /// Media duration in seconds
    DurationChanged(f64),
    PauseChanged(bool),
    BufferingChanged(bool),
    /// Engine-local audio track id (None when disabled)
    AudioTrackChanged(Option<i64>),
    /// Engine-local subtitle track id (None when disabled)
    SubtitleTrackChanged(Option<i64>),
    VolumeChanged(f64),
    MuteChanged(bool),
    /// The engine reached end of media
    PlaybackEnded,
    /// The engine process exited, clean or crashed
    Exited { clean: bool },
    /// Unrecoverable backend condition
    Fatal(FatalKind),
    /// Engine-side script extension message
    ScriptMessage(Vec<String>),
}

/// Opaque host surface handle for embedded video (platform window id)
pub type VideoTarget = u64;

/// Viewport rectangle within the attached surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Capability interface implemented by every backend variant
pub trait PlayerBackend: Send + Sync {
    /// Stable backend name used for selection and logging
    fn name(&self) -> &'static str;

    /// Start the engine for the given media URL
    fn start(&self, engine_binary: &Path, extra_args: &[String], media_url: &str) -> Result<()>;

    /// Stop the engine (graceful quit, then kill)
    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Submit a typed command to the engine
    fn send_typed_command(&self, tokens: Vec<WireValue>);

    /// Submit a command of plain string tokens
    fn send_command(&self, tokens: &[&str]) {
        self.send_typed_command(tokens.iter().map(|t| WireValue::from(*t)).collect());
    }

    /// Subscribe to this backend's event stream
    ///
    /// The stream is stable across engine restarts within one backend
    /// instance; the controller subscribes once per instance.
    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;

    /// Whether this backend renders into a host surface
    fn supports_embedded_video(&self) -> bool {
        false
    }

    fn attach_video_target(&self, _target: VideoTarget) -> Result<()> {
        Err(Error::Unsupported(format!(
            "backend {} does not support embedded video",
            self.name()
        )))
    }

    fn detach_video_target(&self) {}

    fn set_video_bounds(&self, _bounds: VideoBounds) -> Result<()> {
        Err(Error::Unsupported(format!(
            "backend {} does not support embedded video",
            self.name()
        )))
    }
}

/// Create a backend by name
///
/// Unrecognized names fall back to the process backend with a warning;
/// selection never fails.
pub fn create_backend(name: Option<&str>) -> Box<dyn PlayerBackend> {
    match name {
        None | Some("process") => Box::new(ProcessBackend::new()),
        Some("embedded") => Box::new(EmbeddedBackend::new()),
        Some(other) => {
            warn!("unknown backend '{}', falling back to process backend", other);
            Box::new(ProcessBackend::new())
        }
    }
}
