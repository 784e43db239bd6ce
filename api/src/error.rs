//! Error taxonomy for the analysis pipeline.
//!
//! Per-frame failures ([`FrameError`]) are recorded as data on the verdict and
//! never abort a request. Only [`AnalysisError`] surfaces to the caller.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::sampling::SamplePoint;

/// Wire name of each per-frame failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameErrorKind {
    ToolUnavailable,
    ToolExecutionFailed,
    FrameNotProduced,
    ClassificationFailed,
}

/// Failure of a single sample point.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FrameError {
    /// The extraction tool could not be spawned. Ends the request's extraction.
    #[error("{tool} not found on server")]
    ToolUnavailable { tool: String, detail: String },

    #[error("{tool} failed at {point}")]
    ToolExecutionFailed {
        tool: String,
        point: SamplePoint,
        stderr: String,
    },

    #[error("{tool} said ok but frame was not created")]
    FrameNotProduced { tool: String },

    #[error("image analysis failed: {0}")]
    ClassificationFailed(String),
}

impl FrameError {
    pub fn kind(&self) -> FrameErrorKind {
        match self {
            FrameError::ToolUnavailable { .. } => FrameErrorKind::ToolUnavailable,
            FrameError::ToolExecutionFailed { .. } => FrameErrorKind::ToolExecutionFailed,
            FrameError::FrameNotProduced { .. } => FrameErrorKind::FrameNotProduced,
            FrameError::ClassificationFailed(_) => FrameErrorKind::ClassificationFailed,
        }
    }

    /// Diagnostics captured from the tool, if it ran.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            FrameError::ToolExecutionFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Why the tool could not be started at all.
    pub fn detail(&self) -> Option<&str> {
        match self {
            FrameError::ToolUnavailable { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

/// Whole-request sentinel for stride sampling: nothing usable came out.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("no_frames_extracted")]
pub struct NoFramesExtracted {
    pub detail: String,
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("cannot read image {path:?}: {source}")]
    UnreadableImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("model inference failed: {0}")]
    Inference(String),
}

/// Request-level failure. Everything else is reported inside the verdict.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot read video {path:?}: {source}")]
    VideoUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
