//! Timestamped PNG snapshots of the annotated frame.

use chrono::{DateTime, Local};
use moodcam_hw::Frame;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenshotError {
    #[error("no frame to capture yet")]
    NoFrame,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// `<dir>/emotion_YYYYMMDD_HHMMSS.png`
pub fn screenshot_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("emotion_{}.png", at.format("%Y%m%d_%H%M%S")))
}

/// Write `frame` as PNG into `dir`, creating it if needed.
pub fn save(frame: Option<&Frame>, dir: &Path) -> Result<PathBuf, ScreenshotError> {
    let frame = frame.ok_or(ScreenshotError::NoFrame)?;
    std::fs::create_dir_all(dir)?;
    let path = screenshot_path(dir, Local::now());
    frame.to_image().save(&path)?;
    tracing::info!(path = %path.display(), "screenshot saved");
    Ok(path)
}
