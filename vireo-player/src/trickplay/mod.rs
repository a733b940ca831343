//! Trickplay scrub-preview processing
//!
//! Converts a server-provided set of tiled thumbnail sheets into one
//! random-access binary file of per-frame pixel data. Frames are stored
//! back to back with no header or padding, 4 bytes per pixel in BGRA
//! order, so frame `i` lives at byte offset `i * width * height * 4`.
//!
//! Trickplay is a soft feature: any failure here disables previews for
//! the item and never affects playback.

pub mod index;
pub mod processor;

pub use index::{PreviewFrame, TrickplayIndex};
pub use processor::{HttpTileFetcher, TileFetcher, TrickplayBuilder};

use vireo_common::types::TrickplayInfo;

/// Bytes per stored pixel (BGRA)
pub const BYTES_PER_PIXEL: u32 = 4;

/// Pick the resolution closest to the preferred frame width
///
/// Ties break toward the smaller width. Returns None when the catalog
/// offered nothing.
pub fn select_resolution(
    available: &[TrickplayInfo],
    preferred_width: u32,
) -> Option<TrickplayInfo> {
    available
        .iter()
        .copied()
        .filter(|info| info.thumbnail_count > 0 && info.frames_per_sheet() > 0)
        .min_by_key(|info| {
            let distance = info.width.abs_diff(preferred_width);
            (distance, info.width)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32) -> TrickplayInfo {
        TrickplayInfo {
            width,
            height: width * 9 / 16,
            tile_width: 10,
            tile_height: 10,
            interval_ms: 10000,
            thumbnail_count: 100,
        }
    }

    #[test]
    fn test_selects_closest_width() {
        let available = [info(160), info(320), info(640)];
        assert_eq!(select_resolution(&available, 320).unwrap().width, 320);
        assert_eq!(select_resolution(&available, 400).unwrap().width, 320);
        assert_eq!(select_resolution(&available, 600).unwrap().width, 640);
    }

    #[test]
    fn test_tie_breaks_toward_smaller() {
        let available = [info(240), info(400)];
        // 320 is equidistant from both
        assert_eq!(select_resolution(&available, 320).unwrap().width, 240);
    }

    #[test]
    fn test_empty_and_degenerate() {
        assert!(select_resolution(&[], 320).is_none());
        let empty = TrickplayInfo { thumbnail_count: 0, ..info(320) };
        assert!(select_resolution(&[empty], 320).is_none());
    }
}
