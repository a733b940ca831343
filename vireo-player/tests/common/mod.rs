//! Shared test doubles for controller integration tests

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use vireo_common::events::PlaybackState;
use vireo_common::types::{EpisodeRef, MediaSegment, PlaybackReport, TrickplayInfo};
use vireo_player::backend::{BackendEvent, PlayerBackend};
use vireo_player::catalog::CatalogService;
use vireo_player::controller::PlayerController;
use vireo_player::error::Result;
use vireo_player::protocol::WireValue;

/// Test backend: records every command and start, events are injected by
/// the test through the shared sender
pub struct MockBackend {
    handle: MockBackendHandle,
}

#[derive(Clone)]
pub struct MockBackendHandle {
    pub commands: Arc<Mutex<Vec<Vec<WireValue>>>>,
    pub started_urls: Arc<Mutex<Vec<String>>>,
    pub stop_calls: Arc<AtomicU32>,
    pub event_tx: broadcast::Sender<BackendEvent>,
    running: Arc<AtomicBool>,
}

pub fn mock_backend() -> (Box<dyn PlayerBackend>, MockBackendHandle) {
    let (event_tx, _) = broadcast::channel(256);
    let handle = MockBackendHandle {
        commands: Arc::new(Mutex::new(Vec::new())),
        started_urls: Arc::new(Mutex::new(Vec::new())),
        stop_calls: Arc::new(AtomicU32::new(0)),
        event_tx,
        running: Arc::new(AtomicBool::new(false)),
    };
    (
        Box::new(MockBackend {
            handle: handle.clone(),
        }),
        handle,
    )
}

impl MockBackendHandle {
    pub fn emit(&self, event: BackendEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn commands(&self) -> Vec<Vec<WireValue>> {
        self.commands.lock().unwrap().clone()
    }

    pub fn started_urls(&self) -> Vec<String> {
        self.started_urls.lock().unwrap().clone()
    }

    /// Whether some recorded command starts with the given tokens
    pub fn sent_command(&self, prefix: &[WireValue]) -> bool {
        self.commands()
            .iter()
            .any(|cmd| cmd.len() >= prefix.len() && cmd[..prefix.len()] == *prefix)
    }
}

impl PlayerBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn start(&self, _engine_binary: &Path, _extra_args: &[String], media_url: &str) -> Result<()> {
        self.handle
            .started_urls
            .lock()
            .unwrap()
            .push(media_url.to_string());
        self.handle.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.handle.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.handle.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.handle.running.load(Ordering::SeqCst)
    }

    fn send_typed_command(&self, tokens: Vec<WireValue>) {
        self.handle.commands.lock().unwrap().push(tokens);
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.handle.event_tx.subscribe()
    }
}

/// Test catalog: records every report, answers from configured data
#[derive(Default)]
pub struct RecordingCatalog {
    pub start_reports: Mutex<Vec<PlaybackReport>>,
    pub progress_reports: Mutex<Vec<PlaybackReport>>,
    pub pause_reports: Mutex<Vec<PlaybackReport>>,
    pub resume_reports: Mutex<Vec<PlaybackReport>>,
    pub stop_reports: Mutex<Vec<(String, u64)>>,
    pub next_episode_calls: Mutex<Vec<(String, String)>>,
    pub next_episode: Mutex<Option<EpisodeRef>>,
    pub segments: Mutex<Vec<MediaSegment>>,
    pub trickplay: Mutex<Vec<TrickplayInfo>>,
}

impl RecordingCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stop_report_count(&self) -> usize {
        self.stop_reports.lock().unwrap().len()
    }
}

#[async_trait]
impl CatalogService for RecordingCatalog {
    async fn report_start(&self, report: PlaybackReport) -> Result<()> {
        self.start_reports.lock().unwrap().push(report);
        Ok(())
    }

    async fn report_progress(&self, report: PlaybackReport) -> Result<()> {
        self.progress_reports.lock().unwrap().push(report);
        Ok(())
    }

    async fn report_paused(&self, report: PlaybackReport) -> Result<()> {
        self.pause_reports.lock().unwrap().push(report);
        Ok(())
    }

    async fn report_resumed(&self, report: PlaybackReport) -> Result<()> {
        self.resume_reports.lock().unwrap().push(report);
        Ok(())
    }

    async fn report_stopped(&self, item_id: &str, position_ms: u64) -> Result<()> {
        self.stop_reports
            .lock()
            .unwrap()
            .push((item_id.to_string(), position_ms));
        Ok(())
    }

    async fn next_unplayed_episode(
        &self,
        series_id: &str,
        after_item_id: &str,
    ) -> Result<Option<EpisodeRef>> {
        self.next_episode_calls
            .lock()
            .unwrap()
            .push((series_id.to_string(), after_item_id.to_string()));
        Ok(self.next_episode.lock().unwrap().clone())
    }

    async fn media_segments(&self, _item_id: &str) -> Result<Vec<MediaSegment>> {
        Ok(self.segments.lock().unwrap().clone())
    }

    async fn trickplay_info(&self, _item_id: &str) -> Result<Vec<TrickplayInfo>> {
        Ok(self.trickplay.lock().unwrap().clone())
    }

    async fn stream_url(&self, item_id: &str) -> Result<String> {
        Ok(format!("http://catalog/stream/{}", item_id))
    }

    fn trickplay_tile_url(&self, item_id: &str, width: u32, tile_index: u32) -> String {
        format!("http://catalog/trickplay/{}/{}/{}", item_id, width, tile_index)
    }
}

/// Poll until the controller reaches a state, panicking on timeout
pub async fn wait_for_state(controller: &PlayerController, expected: PlaybackState) {
    wait_until(|| controller.snapshot().state() == expected).await;
}

/// Poll a condition with a 5 second ceiling
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 5s");
}

/// Give in-flight controller work a moment to land
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
