//! Catalog service contracts
//!
//! The playback controller consumes the remote library server only
//! through this trait: progress reporting, next-episode resolution,
//! segment metadata, and trickplay geometry. Concrete HTTP clients live
//! with the application; the controller never sees transport details.
//!
//! All reporting calls are idempotent per invocation; the controller is
//! responsible for at-most-once stop reporting per attempt.

use async_trait::async_trait;

use vireo_common::types::{EpisodeRef, MediaSegment, PlaybackReport, TrickplayInfo};

use crate::error::Result;

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Report that playback of an item started
    async fn report_start(&self, report: PlaybackReport) -> Result<()>;

    /// Report periodic playback progress
    async fn report_progress(&self, report: PlaybackReport) -> Result<()>;

    /// Report a pause edge
    async fn report_paused(&self, report: PlaybackReport) -> Result<()>;

    /// Report a resume edge
    async fn report_resumed(&self, report: PlaybackReport) -> Result<()>;

    /// Report final stop state; `position_ms` is the last known position
    async fn report_stopped(&self, item_id: &str, position_ms: u64) -> Result<()>;

    /// Next unplayed episode of a series, after the given item
    ///
    /// May return None when the series is finished or unknown.
    async fn next_unplayed_episode(
        &self,
        series_id: &str,
        after_item_id: &str,
    ) -> Result<Option<EpisodeRef>>;

    /// Intro/outro segments for an item (may be empty)
    async fn media_segments(&self, item_id: &str) -> Result<Vec<MediaSegment>>;

    /// Available trickplay resolutions for an item (may be empty)
    async fn trickplay_info(&self, item_id: &str) -> Result<Vec<TrickplayInfo>>;

    /// Streamable URL for an item, used when autoplay starts the next one
    async fn stream_url(&self, item_id: &str) -> Result<String>;

    /// URL of one trickplay tile sheet at the given frame width
    fn trickplay_tile_url(&self, item_id: &str, width: u32, tile_index: u32) -> String;
}

/// Catalog that answers every query with nothing and accepts every report
///
/// Used by the standalone binary when playing a plain URL with no library
/// server behind it.
pub struct NoopCatalog;

#[async_trait]
impl CatalogService for NoopCatalog {
    async fn report_start(&self, _report: PlaybackReport) -> Result<()> {
        Ok(())
    }

    async fn report_progress(&self, _report: PlaybackReport) -> Result<()> {
        Ok(())
    }

    async fn report_paused(&self, _report: PlaybackReport) -> Result<()> {
        Ok(())
    }

    async fn report_resumed(&self, _report: PlaybackReport) -> Result<()> {
        Ok(())
    }

    async fn report_stopped(&self, _item_id: &str, _position_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn next_unplayed_episode(
        &self,
        _series_id: &str,
        _after_item_id: &str,
    ) -> Result<Option<EpisodeRef>> {
        Ok(None)
    }

    async fn media_segments(&self, _item_id: &str) -> Result<Vec<MediaSegment>> {
        Ok(Vec::new())
    }

    async fn trickplay_info(&self, _item_id: &str) -> Result<Vec<TrickplayInfo>> {
        Ok(Vec::new())
    }

    async fn stream_url(&self, item_id: &str) -> Result<String> {
        Ok(item_id.to_string())
    }

    fn trickplay_tile_url(&self, _item_id: &str, _width: u32, _tile_index: u32) -> String {
        String::new()
    }
}
