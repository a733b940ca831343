//! Embedded-surface backend
//!
//! Drives the same engine as the process backend but renders into a host
//! window: the attached surface handle is passed to the engine at spawn
//! and viewport updates travel over the script-message extension
//! protocol. Starting without an attached render target is the named
//! fatal condition that triggers the controller's fallback to the
//! process backend.

use std::path::Path;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::backend::process::EngineBackendCore;
use crate::backend::{BackendEvent, FatalKind, PlayerBackend, VideoBounds, VideoTarget};
use crate::error::{Error, Result};
use crate::protocol::WireValue;

/// Backend that embeds engine video into a host surface
pub struct EmbeddedBackend {
    core: EngineBackendCore,
    target: Mutex<Option<VideoTarget>>,
}

impl EmbeddedBackend {
    pub fn new() -> Self {
        Self {
            core: EngineBackendCore::new(),
            target: Mutex::new(None),
        }
    }
}

impl Default for EmbeddedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerBackend for EmbeddedBackend {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn start(&self, engine_binary: &Path, extra_args: &[String], media_url: &str) -> Result<()> {
        let target = *self.target.lock().expect("target slot poisoned");
        let Some(target) = target else {
            // Fatal goes over the event stream so the controller handles
            // it on the same path as mid-session backend failures.
            warn!("embedded backend started without a render target");
            self.core
                .emit(BackendEvent::Fatal(FatalKind::RenderContextUnavailable));
            return Err(Error::Backend(
                FatalKind::RenderContextUnavailable.to_string(),
            ));
        };

        let mut args = vec!["--no-terminal".to_string(), format!("--wid={}", target)];
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

    fn supports_embedded_video(&self) -> bool {
        true
    }

    fn attach_video_target(&self, target: VideoTarget) -> Result<()> {
        let mut slot = self.target.lock().expect("target slot poisoned");
        if slot.replace(target).is_some() && self.is_running() {
            // The engine keeps the surface it was spawned with; a new
            // target only takes effect on the next start.
            info!("render target replaced while running, applies on next start");
        }
        Ok(())
    }

    fn detach_video_target(&self) {
        let mut slot = self.target.lock().expect("target slot poisoned");
        *slot = None;
    }

    fn set_video_bounds(&self, bounds: VideoBounds) -> Result<()> {
        if self.target.lock().expect("target slot poisoned").is_none() {
            return Err(Error::Backend("no render target attached".to_string()));
        }
        self.core.send(vec![
            WireValue::from("script-message"),
            WireValue::from("vireo-viewport"),
            WireValue::from(bounds.x as i64),
            WireValue::from(bounds.y as i64),
            WireValue::from(bounds.width as i64),
            WireValue::from(bounds.height as i64),
        ]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_start_without_target_is_fatal() {
        let backend = EmbeddedBackend::new();
        let mut rx = backend.subscribe();

        let result = backend.start(&PathBuf::from("/bin/true"), &[], "http://x");
        assert!(result.is_err());
        assert_eq!(
            rx.try_recv().unwrap(),
            BackendEvent::Fatal(FatalKind::RenderContextUnavailable)
        );
        assert!(!backend.is_running());
    }

    #[tokio::test]
    async fn test_attach_and_detach_target() {
        let backend = EmbeddedBackend::new();
        backend.attach_video_target(0x4a01).unwrap();
        // Bounds are accepted once a target exists (command is dropped
        // until an engine is started, which is fine)
        backend
            .set_video_bounds(VideoBounds { x: 0, y: 0, width: 1280, height: 720 })
            .unwrap();

        backend.detach_video_target();
        assert!(backend
            .set_video_bounds(VideoBounds { x: 0, y: 0, width: 1280, height: 720 })
            .is_err());
    }
}
