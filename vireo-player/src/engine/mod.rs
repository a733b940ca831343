//! Engine process and IPC management
//!
//! Owns the external media-engine subprocess and the JSON line channel to
//! it. The channel submodule is the dumb duplex codec; the manager drives
//! process lifecycle, connection retry, command queueing, property
//! subscription, and translation of inbound JSON into typed events.

pub mod channel;
pub mod manager;

pub use manager::{EngineEvent, EngineLaunch, EngineManager};
