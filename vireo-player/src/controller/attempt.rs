//! Per-attempt playback state
//!
//! Everything here is created for one playback attempt and fully reset
//! on entry to Idle: track-mapping tables, segment/skip bookkeeping,
//! queued seek and track selections, reporting flags, prefetch cache.
//! Engine-local track ids are re-enumerated on every load and must never
//! outlive the attempt.

use std::collections::{HashMap, HashSet};

use vireo_common::types::{EpisodeRef, MediaSegment, SegmentKind};

/// Arguments of a play request
#[derive(Debug, Clone)]
pub struct PlayParams {
    pub url: String,
    pub item_id: String,
    pub start_position_ms: u64,
    pub series_id: String,
    pub season_id: String,
    pub library_id: String,
    pub framerate: f64,
    pub is_hdr: bool,
}

/// Explicit track selection and resolved maps supplied with a play request
#[derive(Debug, Clone, Default)]
pub struct TrackSelection {
    /// Catalog stream index of the audio track to select
    pub audio_index: Option<i64>,
    /// Catalog stream index of the subtitle track; -1 disables subtitles
    pub subtitle_index: Option<i64>,
    /// (catalog stream index, engine-local id) pairs for audio tracks
    pub audio_map: Vec<(i64, i64)>,
    /// (catalog stream index, engine-local id) pairs for subtitle tracks
    pub subtitle_map: Vec<(i64, i64)>,
}

/// Catalog index -> engine-local id maps, rebuilt on every load
#[derive(Debug, Clone, Default)]
pub struct TrackMaps {
    audio: HashMap<i64, i64>,
    subtitle: HashMap<i64, i64>,
}

impl TrackMaps {
    pub fn from_selection(selection: &TrackSelection) -> Self {
        Self {
            audio: selection.audio_map.iter().copied().collect(),
            subtitle: selection.subtitle_map.iter().copied().collect(),
        }
    }

    /// Engine-local id for a catalog audio stream index
    pub fn resolve_audio(&self, catalog_index: i64) -> Option<i64> {
        self.audio.get(&catalog_index).copied()
    }

    /// Engine-local id for a catalog subtitle stream index
    pub fn resolve_subtitle(&self, catalog_index: i64) -> Option<i64> {
        self.subtitle.get(&catalog_index).copied()
    }

    /// Catalog index whose audio track maps to this engine id
    pub fn reverse_audio(&self, engine_id: i64) -> Option<i64> {
        self.audio
            .iter()
            .find(|(_, id)| **id == engine_id)
            .map(|(catalog, _)| *catalog)
    }

    pub fn reverse_subtitle(&self, engine_id: i64) -> Option<i64> {
        self.subtitle
            .iter()
            .find(|(_, id)| **id == engine_id)
            .map(|(catalog, _)| *catalog)
    }
}

/// Snapshot of identifiers and preferences captured when a completion
/// threshold is met, consumed to start the next item
#[derive(Debug, Clone, PartialEq)]
pub struct AutoplayContext {
    pub item_id: String,
    pub series_id: String,
    pub season_id: String,
    pub library_id: String,
    pub audio_index: Option<i64>,
    pub subtitle_index: Option<i64>,
    pub framerate: f64,
    pub is_hdr: bool,
}

/// Result of a next-episode prefetch, validated before use
#[derive(Debug, Clone)]
pub struct PrefetchedEpisode {
    /// Series the lookup ran against
    pub series_id: String,
    /// Item that was playing when the lookup was issued
    pub for_item_id: String,
    pub episode: Option<EpisodeRef>,
}

impl PrefetchedEpisode {
    /// A prefetched result is only trusted when both the series and the
    /// originating item match the just-finished attempt.
    pub fn matches(&self, series_id: &str, item_id: &str) -> bool {
        self.series_id == series_id && self.for_item_id == item_id
    }
}

/// Intro/outro tracking with one auto-skip per item per segment kind
#[derive(Debug, Default)]
pub struct SegmentTracker {
    segments: Vec<MediaSegment>,
    skipped: HashSet<SegmentKind>,
    last_position_ms: Option<u64>,
}

impl SegmentTracker {
    /// Install segment metadata, which arrives asynchronously.
    ///
    /// Returns a skip candidate when the current position already sits
    /// inside a segment whose start was passed no more than `grace_ms`
    /// ago; beyond the grace window the segment plays out normally.
    pub fn set_segments(
        &mut self,
        segments: Vec<MediaSegment>,
        current_position_ms: u64,
        grace_ms: u64,
    ) -> Option<MediaSegment> {
        self.segments = segments;
        self.segments
            .iter()
            .find(|seg| {
                seg.contains(current_position_ms)
                    && current_position_ms.saturating_sub(seg.start_ms) <= grace_ms
                    && !self.skipped.contains(&seg.kind)
            })
            .cloned()
    }

    /// Record a position update.
    ///
    /// Returns the segment just entered (transition in, not continuous
    /// containment) when it has not been skipped before.
    pub fn on_position(&mut self, position_ms: u64) -> Option<MediaSegment> {
        let entered = self
            .segments
            .iter()
            .find(|seg| {
                seg.contains(position_ms)
                    && !self.skipped.contains(&seg.kind)
                    && self.last_position_ms.map_or(true, |last| !seg.contains(last))
            })
            .cloned();
        self.last_position_ms = Some(position_ms);
        entered
    }

    /// Mark a segment kind as skipped for the rest of the attempt
    pub fn mark_skipped(&mut self, kind: SegmentKind) {
        self.skipped.insert(kind);
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// All mutable state of one playback attempt
#[derive(Debug)]
pub struct Attempt {
    /// Monotonic attempt identifier; stale async results are discarded
    /// by comparing against it
    pub id: u64,
    pub params: PlayParams,
    pub selected_audio: Option<i64>,
    pub selected_subtitle: Option<i64>,
    pub maps: TrackMaps,
    /// Seek queued for execution once buffering starts
    pub pending_seek_ms: Option<u64>,
    pub start_reported: bool,
    pub stop_reported: bool,
    /// Position reading at the last buffering entry, used to detect
    /// meaningful progress
    pub buffering_start_ms: Option<u64>,
    pub segments: SegmentTracker,
    pub prefetch_requested: bool,
    pub prefetched: Option<PrefetchedEpisode>,
    pub position_updates: u64,
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl Attempt {
    pub fn new(id: u64, params: PlayParams, selection: Option<TrackSelection>) -> Self {
        let selection = selection.unwrap_or_default();
        let pending_seek_ms = (params.start_position_ms > 0).then_some(params.start_position_ms);
        Self {
            id,
            params,
            selected_audio: selection.audio_index,
            selected_subtitle: selection.subtitle_index,
            maps: TrackMaps::from_selection(&selection),
            pending_seek_ms,
            start_reported: false,
            stop_reported: false,
            buffering_start_ms: None,
            segments: SegmentTracker::default(),
            prefetch_requested: false,
            prefetched: None,
            position_updates: 0,
            position_ms: 0,
            duration_ms: 0,
        }
    }

    /// Whether the completion threshold was crossed at the final position
    pub fn threshold_met(&self, threshold_percent: u8) -> bool {
        if self.duration_ms == 0 {
            return false;
        }
        self.position_ms * 100 >= self.duration_ms * u64::from(threshold_percent)
    }

    /// Capture the autoplay context for this attempt
    pub fn autoplay_context(&self) -> AutoplayContext {
        AutoplayContext {
            item_id: self.params.item_id.clone(),
            series_id: self.params.series_id.clone(),
            season_id: self.params.season_id.clone(),
            library_id: self.params.library_id.clone(),
            audio_index: self.selected_audio,
            subtitle_index: self.selected_subtitle,
            framerate: self.params.framerate,
            is_hdr: self.params.is_hdr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> TrackSelection {
        TrackSelection {
            audio_index: Some(5),
            subtitle_index: Some(7),
            audio_map: vec![(4, 1), (5, 2)],
            subtitle_map: vec![(6, 1), (7, 2), (8, 3)],
        }
    }

    #[test]
    fn test_map_resolution_deterministic() {
        let maps = TrackMaps::from_selection(&selection());
        for _ in 0..3 {
            assert_eq!(maps.resolve_audio(5), Some(2));
            assert_eq!(maps.resolve_subtitle(8), Some(3));
        }
    }

    #[test]
    fn test_unmapped_index_misses() {
        let maps = TrackMaps::from_selection(&selection());
        assert_eq!(maps.resolve_audio(99), None);
        assert_eq!(maps.resolve_subtitle(5), None);
    }

    #[test]
    fn test_reverse_lookup() {
        let maps = TrackMaps::from_selection(&selection());
        assert_eq!(maps.reverse_audio(2), Some(5));
        assert_eq!(maps.reverse_subtitle(1), Some(6));
        assert_eq!(maps.reverse_audio(9), None);
    }

    fn intro() -> MediaSegment {
        MediaSegment {
            kind: SegmentKind::Intro,
            start_ms: 10_000,
            end_ms: 40_000,
        }
    }

    #[test]
    fn test_segment_entered_once() {
        let mut tracker = SegmentTracker::default();
        tracker.set_segments(vec![intro()], 0, 5000);

        assert!(tracker.on_position(5_000).is_none());
        // Transition in
        let entered = tracker.on_position(12_000).unwrap();
        assert_eq!(entered.kind, SegmentKind::Intro);
        tracker.mark_skipped(SegmentKind::Intro);

        // Continuous containment and re-entry stay quiet
        assert!(tracker.on_position(15_000).is_none());
        assert!(tracker.on_position(5_000).is_none());
        assert!(tracker.on_position(12_000).is_none());
    }

    #[test]
    fn test_segment_transition_not_containment() {
        let mut tracker = SegmentTracker::default();
        tracker.set_segments(vec![intro()], 0, 5000);

        // First update already inside counts as a transition
        assert!(tracker.on_position(20_000).is_some());
    }

    #[test]
    fn test_late_segments_within_grace() {
        let mut tracker = SegmentTracker::default();
        // Playback is 3s past the intro start when metadata arrives
        let candidate = tracker.set_segments(vec![intro()], 13_000, 5000);
        assert_eq!(candidate.unwrap().kind, SegmentKind::Intro);
    }

    #[test]
    fn test_late_segments_beyond_grace() {
        let mut tracker = SegmentTracker::default();
        // 20s past the start: let it play
        assert!(tracker.set_segments(vec![intro()], 30_000, 5000).is_none());
    }

    #[test]
    fn test_prefetch_validation() {
        let prefetched = PrefetchedEpisode {
            series_id: "s1".to_string(),
            for_item_id: "ep3".to_string(),
            episode: None,
        };
        assert!(prefetched.matches("s1", "ep3"));
        assert!(!prefetched.matches("s1", "ep4"));
        assert!(!prefetched.matches("s2", "ep3"));
    }

    #[test]
    fn test_threshold() {
        let params = PlayParams {
            url: "http://x".to_string(),
            item_id: "item1".to_string(),
            start_position_ms: 0,
            series_id: String::new(),
            season_id: String::new(),
            library_id: String::new(),
            framerate: 24.0,
            is_hdr: false,
        };
        let mut attempt = Attempt::new(1, params, None);
        attempt.duration_ms = 100_000;
        attempt.position_ms = 92_000;
        assert!(attempt.threshold_met(90));
        attempt.position_ms = 89_999;
        assert!(!attempt.threshold_met(90));
        // Unknown duration never meets the threshold
        attempt.duration_ms = 0;
        assert!(!attempt.threshold_met(90));
    }

    #[test]
    fn test_start_position_queues_seek() {
        let params = PlayParams {
            url: "http://x".to_string(),
            item_id: "item1".to_string(),
            start_position_ms: 30_000,
            series_id: String::new(),
            season_id: String::new(),
            library_id: String::new(),
            framerate: 24.0,
            is_hdr: false,
        };
        let attempt = Attempt::new(1, params, None);
        assert_eq!(attempt.pending_seek_ms, Some(30_000));
    }
}
