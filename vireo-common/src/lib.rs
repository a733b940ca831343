//! # Vireo Common Library
//!
//! Shared code for the Vireo playback client including:
//! - Error types
//! - Event types (PlayerEvent enum) and the EventBus
//! - Catalog-facing data types (segments, trickplay info, episode refs)
//! - Configuration resolution
//! - Time utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;
pub mod types;

pub use error::{Error, Result};
pub use events::{EventBus, PlaybackState, PlayerEvent, TrackKind};
