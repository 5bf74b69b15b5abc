//! Still Capture
//!
//! Writes the latest frame to disk as a timestamped PNG. Snapshots go to a
//! dedicated directory which is created on first use; file names embed the
//! capture time so repeated shots never collide within a second of each
//! other.

use crate::video::frame::{PixelFormat, VideoFrame};
use image::RgbImage;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

/// Error types for snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Could not create the snapshot directory
    #[error("Cannot create snapshot directory: {0}")]
    Directory(#[from] io::Error),

    /// The frame cannot be converted for encoding
    #[error("Cannot encode {0} frame as an image")]
    UnsupportedFormat(PixelFormat),

    /// The frame buffer does not match its stated dimensions
    #[error("Frame buffer does not match {width}x{height}")]
    MalformedFrame {
        /// Stated width
        width: u32,
        /// Stated height
        height: u32,
    },

    /// PNG encoding failed
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// File-name timestamp, e.g. `capture_20260807_153012.png`
fn timestamped_name(now: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    // The description above is static, formatting it cannot fail.
    let stamp = now.format(&format).unwrap_or_else(|_| "unknown".into());
    format!("capture_{}.png", stamp)
}

/// Save a frame as a PNG under `dir`
///
/// Creates `dir` if needed and returns the path written.
pub fn save_snapshot(frame: &VideoFrame, dir: &Path) -> Result<PathBuf, SnapshotError> {
    let rgb = frame
        .convert(PixelFormat::RGB24)
        .ok_or(SnapshotError::UnsupportedFormat(frame.format))?;

    let img = RgbImage::from_raw(rgb.width, rgb.height, rgb.data).ok_or(
        SnapshotError::MalformedFrame {
            width: rgb.width,
            height: rgb.height,
        },
    )?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(timestamped_name(OffsetDateTime::now_utc()));

    img.save(&path)
        .map_err(|e| SnapshotError::Encode(e.to_string()))?;

    info!(path = %path.display(), "Snapshot saved");
    Ok(path)
}
