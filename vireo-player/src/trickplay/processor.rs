//! Trickplay build pipeline
//!
//! Downloads every tile sheet concurrently, then — only once all sheets
//! have arrived — decodes and slices them strictly in tile-index order,
//! appending each frame's BGRA bytes to the output file. Any missing
//! tile, decode failure, or dimension mismatch aborts the build and
//! removes the partial output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use vireo_common::types::TrickplayInfo;

use super::{TrickplayIndex, BYTES_PER_PIXEL};
use crate::error::{Error, Result};

/// Fetches one tile sheet by URL
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetcher backed by a shared HTTP client
pub struct HttpTileFetcher {
    client: reqwest::Client,
}

impl HttpTileFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTileFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Builds one trickplay blob from tile-sheet URLs
pub struct TrickplayBuilder {
    fetcher: Arc<dyn TileFetcher>,
}

impl TrickplayBuilder {
    pub fn new(fetcher: Arc<dyn TileFetcher>) -> Self {
        Self { fetcher }
    }

    /// Download, slice, and serialize all frames into `output_path`
    ///
    /// `tile_urls` must hold one URL per sheet (`info.sheet_count()` of
    /// them). On any failure the partial output is deleted.
    pub async fn build(
        &self,
        info: TrickplayInfo,
        tile_urls: &[String],
        output_path: &Path,
    ) -> Result<TrickplayIndex> {
        let result = self.build_inner(info, tile_urls, output_path).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(output_path).await;
        }
        result
    }

    async fn build_inner(
        &self,
        info: TrickplayInfo,
        tile_urls: &[String],
        output_path: &Path,
    ) -> Result<TrickplayIndex> {
        if info.thumbnail_count == 0 || info.frames_per_sheet() == 0 {
            return Err(Error::Trickplay("no frames to process".to_string()));
        }
        let sheet_count = info.sheet_count() as usize;
        if tile_urls.len() != sheet_count {
            return Err(Error::Trickplay(format!(
                "expected {} tile urls, got {}",
                sheet_count,
                tile_urls.len()
            )));
        }

        // Download everything first; slicing starts only when the full
        // set is present so the output is written in one ordered pass.
        let downloads = tile_urls.iter().map(|url| self.fetcher.fetch(url));
        let sheets: Vec<Vec<u8>> = try_join_all(downloads).await?;
        debug!("downloaded {} tile sheets", sheets.len());

        let frame_size =
            (info.width * info.height * BYTES_PER_PIXEL) as usize;
        let mut file = tokio::fs::File::create(output_path).await?;
        let mut frames_written: u32 = 0;

        for (sheet_index, bytes) in sheets.iter().enumerate() {
            let frames = slice_sheet(&info, sheet_index as u32, bytes)?;
            for frame in frames {
                debug_assert_eq!(frame.len(), frame_size);
                file.write_all(&frame).await?;
                frames_written += 1;
            }
        }
        file.flush().await?;
        drop(file);

        if frames_written != info.thumbnail_count {
            return Err(Error::Trickplay(format!(
                "sliced {} frames, expected {}",
                frames_written, info.thumbnail_count
            )));
        }

        // The format has no header; length is the only integrity check.
        let expected_len = u64::from(info.thumbnail_count) * frame_size as u64;
        let actual_len = tokio::fs::metadata(output_path).await?.len();
        if actual_len != expected_len {
            return Err(Error::Trickplay(format!(
                "output size mismatch: expected {} bytes, wrote {}",
                expected_len, actual_len
            )));
        }

        info!(
            "trickplay blob built: {} frames, {} bytes, {}",
            info.thumbnail_count,
            actual_len,
            output_path.display()
        );
        Ok(TrickplayIndex::new(output_path.to_path_buf(), &info))
    }
}

/// Decode one sheet and slice it into per-frame BGRA buffers, row-major
///
/// Produces exactly the frames this sheet contributes to the blob
/// (`thumbnail_count` bounds the last sheet). A frame whose source rect
/// falls outside a cropped final sheet is emitted as a zeroed blank; the
/// same condition on any earlier sheet is a dimension mismatch and
/// aborts.
fn slice_sheet(info: &TrickplayInfo, sheet_index: u32, bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let decoded = image::load_from_memory(bytes)?;
    let rgba = decoded.into_rgba8();
    let (sheet_width, sheet_height) = rgba.dimensions();

    let frame_width = info.width;
    let frame_height = info.height;
    let frame_size = (frame_width * frame_height * BYTES_PER_PIXEL) as usize;
    let frames_per_sheet = info.frames_per_sheet();
    let first_frame = sheet_index * frames_per_sheet;
    let is_last_sheet = sheet_index + 1 == info.sheet_count();

    let mut frames = Vec::with_capacity(frames_per_sheet as usize);
    for cell in 0..frames_per_sheet {
        let global_index = first_frame + cell;
        if global_index >= info.thumbnail_count {
            break;
        }

        let col = cell % info.tile_width;
        let row = cell / info.tile_width;
        let x0 = col * frame_width;
        let y0 = row * frame_height;
        if x0 + frame_width > sheet_width || y0 + frame_height > sheet_height {
            if is_last_sheet {
                // Server cropped the final sheet to its used rows
                frames.push(vec![0u8; frame_size]);
                continue;
            }
            return Err(Error::Trickplay(format!(
                "sheet {} is {}x{}, too small for frame {} at ({}, {})",
                sheet_index, sheet_width, sheet_height, global_index, x0, y0
            )));
        }

        let mut frame = Vec::with_capacity(frame_size);
        for y in y0..y0 + frame_height {
            for x in x0..x0 + frame_width {
                let pixel = rgba.get_pixel(x, y).0;
                // RGBA -> BGRA for the preview consumer
                frame.extend_from_slice(&[pixel[2], pixel[1], pixel[0], pixel[3]]);
            }
        }
        frames.push(frame);
    }
    Ok(frames)
}
