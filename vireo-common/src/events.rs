//! Event types for the Vireo event system
//!
//! Provides the shared `PlayerEvent` definitions and the `EventBus` used by
//! the playback controller to notify front-ends. Events are broadcast via
//! `tokio::sync::broadcast` and can be serialized for transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Playback lifecycle state
///
/// Exactly one value is active per controller instance; the controller
/// mutates it only through its transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No media loaded, all per-attempt state cleared
    Idle,
    /// Engine asked to load media, waiting for the first position update
    Loading,
    /// Media loaded, waiting for enough data to play
    Buffering,
    Playing,
    Paused,
    /// A user-visible failure; recoverable via retry or clear
    Error,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Buffering => write!(f, "buffering"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}

/// Track category for selection and change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Subtitle,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Vireo player events
///
/// Broadcast by the playback controller for any attached front-end.
/// All events carry a UTC timestamp so consumers can order them without
/// trusting delivery latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback state changed
    StateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// Playback position update
    PositionChanged {
        position_ms: u64,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Media finished loading (first position update arrived)
    MediaLoaded {
        item_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A track selection was applied on the engine
    TrackChanged {
        kind: TrackKind,
        /// Catalog stream index (-1 for subtitle disable)
        catalog_index: i64,
        timestamp: DateTime<Utc>,
    },

    /// An intro/outro segment was skipped automatically
    SegmentSkipped {
        kind: crate::types::SegmentKind,
        /// Position seeked to, in milliseconds
        target_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Autoplay started the next item
    NextItemStarted {
        item_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Trickplay preview data is ready for the current item
    TrickplayReady {
        item_id: String,
        frame_count: u32,
        timestamp: DateTime<Utc>,
    },

    /// The user-visible error changed (None when cleared)
    ErrorChanged {
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Playback stopped (explicit stop, end of media, or engine exit)
    Stopped {
        item_id: String,
        position_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for `PlayerEvent`s
///
/// Thin wrapper over `tokio::sync::broadcast`. Lagged receivers drop the
/// oldest events; senders never block.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Channel capacity this bus was created with
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all subscribers
    ///
    /// Send errors are ignored; having no receivers is not a fault.
    pub fn emit(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Number of currently attached receivers
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(PlayerEvent::PositionChanged {
            position_ms: 1500,
            duration_ms: 60000,
            timestamp: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            PlayerEvent::PositionChanged { position_ms, duration_ms, .. } => {
                assert_eq!(position_ms, 1500);
                assert_eq!(duration_ms, 60000);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_emit_without_receivers_is_ok() {
        let bus = EventBus::new(16);
        // No subscribers; must not panic or error
        bus.emit(PlayerEvent::ErrorChanged {
            message: Some("load timeout".to_string()),
            timestamp: Utc::now(),
        });
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&PlaybackState::Buffering).unwrap();
        assert_eq!(json, "\"buffering\"");
        let state: PlaybackState = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(state, PlaybackState::Paused);
    }

    #[test]
    fn test_event_tagged_serialization() {
        let event = PlayerEvent::StateChanged {
            old_state: PlaybackState::Idle,
            new_state: PlaybackState::Loading,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StateChanged");
        assert_eq!(json["new_state"], "loading");
    }
}
