//! Catalog-facing data types
//!
//! Types exchanged with the remote library server's catalog and playback
//! services. Field names follow the server's JSON conventions where a type
//! is deserialized directly from a server response.

use serde::{Deserialize, Serialize};

/// Media segment category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SegmentKind {
    Intro,
    Outro,
}

impl std::fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentKind::Intro => write!(f, "intro"),
            SegmentKind::Outro => write!(f, "outro"),
        }
    }
}

/// A skippable region of an item (intro, outro)
///
/// Multiple segments may exist per item. Positions are in milliseconds
/// from the start of the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSegment {
    pub kind: SegmentKind,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl MediaSegment {
    /// Whether the given position falls inside this segment
    pub fn contains(&self, position_ms: u64) -> bool {
        position_ms >= self.start_ms && position_ms < self.end_ms
    }

    /// Segment length in milliseconds (zero for degenerate segments)
    pub fn length_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Geometry of one trickplay resolution
///
/// The catalog may offer several resolutions per item; the player picks
/// the one closest to its preferred frame width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrickplayInfo {
    /// Single preview frame width in pixels
    pub width: u32,
    /// Single preview frame height in pixels
    pub height: u32,
    /// Frames per tile-sheet row
    pub tile_width: u32,
    /// Frames per tile-sheet column
    pub tile_height: u32,
    /// Time between consecutive frames, milliseconds
    pub interval_ms: u64,
    /// Total preview frames for the item
    pub thumbnail_count: u32,
}

impl TrickplayInfo {
    /// Frames carried by one full tile sheet
    pub fn frames_per_sheet(&self) -> u32 {
        self.tile_width * self.tile_height
    }

    /// Number of tile sheets needed for all frames
    pub fn sheet_count(&self) -> u32 {
        if self.frames_per_sheet() == 0 {
            return 0;
        }
        self.thumbnail_count.div_ceil(self.frames_per_sheet())
    }
}

/// Reference to an episode resolved by the catalog service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub item_id: String,
    pub series_id: String,
    pub season_id: String,
}

/// Playback progress report payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub item_id: String,
    pub position_ms: u64,
    pub paused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_contains() {
        let seg = MediaSegment {
            kind: SegmentKind::Intro,
            start_ms: 5000,
            end_ms: 35000,
        };
        assert!(!seg.contains(4999));
        assert!(seg.contains(5000));
        assert!(seg.contains(34999));
        // End bound is exclusive so adjacent segments never overlap
        assert!(!seg.contains(35000));
        assert_eq!(seg.length_ms(), 30000);
    }

    #[test]
    fn test_degenerate_segment() {
        let seg = MediaSegment {
            kind: SegmentKind::Outro,
            start_ms: 1000,
            end_ms: 1000,
        };
        assert!(!seg.contains(1000));
        assert_eq!(seg.length_ms(), 0);
    }

    #[test]
    fn test_sheet_count() {
        let info = TrickplayInfo {
            width: 320,
            height: 180,
            tile_width: 10,
            tile_height: 10,
            interval_ms: 10000,
            thumbnail_count: 250,
        };
        assert_eq!(info.frames_per_sheet(), 100);
        // 250 frames over 100-frame sheets: 3 sheets, last one partial
        assert_eq!(info.sheet_count(), 3);

        let exact = TrickplayInfo { thumbnail_count: 200, ..info };
        assert_eq!(exact.sheet_count(), 2);
    }
}
