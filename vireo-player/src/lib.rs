//! # Vireo Player
//!
//! Playback orchestration for the Vireo media client: a state-machine
//! controller that drives an external media engine through a pluggable
//! backend abstraction, reconciles catalog track identities against
//! engine-local track ids, auto-skips intro/outro segments, autoplays the
//! next unplayed episode, and pre-builds binary scrub-preview blobs from
//! tiled thumbnail sheets.
//!
//! The controller runs as a single actor task: engine events, catalog
//! results, user commands, and timers are all serialized through one
//! loop, so the transition table can be reasoned about without locks.

pub mod backend;
pub mod catalog;
pub mod controller;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod settings;
pub mod trickplay;

pub use backend::{create_backend, BackendEvent, PlayerBackend};
pub use catalog::CatalogService;
pub use controller::{PlayParams, PlayerController, TrackSelection};
pub use error::{Error, Result};
pub use settings::PlayerSettings;
