//! Player settings
//!
//! Tunables consumed by the controller and trickplay processor. Values
//! come from the application; only the backend override has an
//! environment fallback so deployments can switch backends without a
//! config change.

use std::path::PathBuf;

/// Environment variable selecting the backend by name
pub const BACKEND_ENV_VAR: &str = "VIREO_PLAYER_BACKEND";

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// Engine binary path
    pub engine_binary: PathBuf,
    /// Extra engine arguments ahead of the media URL
    pub engine_args: Vec<String>,
    /// Backend name override (None selects the process backend)
    pub backend_name: Option<String>,

    /// Skip intro/outro segments automatically
    pub auto_skip_enabled: bool,
    /// Percentage of duration past which an item counts as watched
    pub completion_threshold_percent: u8,
    /// Percentage of duration at which the next episode is prefetched
    pub prefetch_percent: u8,

    /// Preferred trickplay frame width in pixels
    pub preferred_trickplay_width: u32,

    /// Abort loading when no position update arrives within this window
    pub load_timeout_ms: u64,
    /// Abort buffering when no position update arrives within this window
    pub buffering_timeout_ms: u64,
    /// Report progress every Nth position update
    pub progress_report_interval: u32,

    /// Initial volume (0-100, engine scale)
    pub volume: f64,
    pub muted: bool,
    /// Audio delay in milliseconds (positive delays audio)
    pub audio_delay_ms: i64,
}

impl PlayerSettings {
    /// Backend name with the environment override applied
    pub fn effective_backend_name(&self) -> Option<String> {
        match std::env::var(BACKEND_ENV_VAR) {
            Ok(name) if !name.is_empty() => Some(name),
            _ => self.backend_name.clone(),
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            engine_binary: PathBuf::from("mpv"),
            engine_args: Vec::new(),
            backend_name: None,
            auto_skip_enabled: true,
            completion_threshold_percent: 90,
            prefetch_percent: 85,
            preferred_trickplay_width: 320,
            load_timeout_ms: 30_000,
            buffering_timeout_ms: 30_000,
            progress_report_interval: 10,
            volume: 100.0,
            muted: false,
            audio_delay_ms: 0,
        }
    }
}
