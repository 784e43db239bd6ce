//! Per-request naming of extracted frames.

use chrono::Utc;
use std::path::{Path, PathBuf};

use crate::sampling::SamplePoint;

/// One video analysis. Frames land in `frames_dir`, which the caller owns.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub video: PathBuf,
    pub frames_dir: PathBuf,
    stamp: String,
    token: String,
}

impl AnalysisRequest {
    pub fn new(video: impl Into<PathBuf>, frames_dir: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            frames_dir: frames_dir.into(),
            stamp: request_stamp(),
            token: random_token(),
        }
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// Fresh output path for a single-frame grab; never reused.
    pub fn frame_path(&self, point: &SamplePoint) -> PathBuf {
        let point = match point {
            SamplePoint::Seconds(secs) => format!("{}s", secs),
            SamplePoint::Frame(index) => format!("f{}", index),
        };
        self.frames_dir
            .join(format!("{}_{}_{}.jpg", self.stamp, point, random_token()))
    }

    /// Filename prefix shared by every frame of a stride run.
    pub fn stride_prefix(&self) -> String {
        format!("{}_{}_frame_", self.stamp, self.token)
    }

    /// ffmpeg output pattern for a stride run.
    pub fn stride_pattern(&self) -> PathBuf {
        self.frames_dir
            .join(format!("{}%04d.jpg", self.stride_prefix()))
    }
}

/// UTC stamp with microseconds, e.g. `20250101120000123456`.
pub fn request_stamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S%6f").to_string()
}

pub(crate) fn random_token() -> String {
    format!("{:016x}", rand::random::<u64>())
}

/// Best-effort removal of a frame file.
pub async fn remove_frame(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove frame");
    }
}
