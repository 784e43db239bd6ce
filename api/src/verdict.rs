//! Per-frame results and the aggregate verdict built from them.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::path::PathBuf;

use crate::classifier::{Classification, HUMAN_LABEL};
use crate::constants::SCORE_DECIMALS;
use crate::error::{FrameError, NoFramesExtracted};
use crate::sampling::SamplePoint;

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Analyzed {
        path: PathBuf,
        classification: Classification,
    },
    Failed {
        error: FrameError,
    },
}

/// One sample point's outcome: an analysis or an error, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub point: SamplePoint,
    pub outcome: FrameOutcome,
}

impl FrameResult {
    pub fn analyzed(point: SamplePoint, path: PathBuf, classification: Classification) -> Self {
        Self {
            point,
            outcome: FrameOutcome::Analyzed {
                path,
                classification,
            },
        }
    }

    pub fn failed(point: SamplePoint, error: FrameError) -> Self {
        Self {
            point,
            outcome: FrameOutcome::Failed { error },
        }
    }

    pub fn classification(&self) -> Option<&Classification> {
        match &self.outcome {
            FrameOutcome::Analyzed { classification, .. } => Some(classification),
            FrameOutcome::Failed { .. } => None,
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            FrameOutcome::Analyzed { path, .. } => Some(path),
            FrameOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&FrameError> {
        match &self.outcome {
            FrameOutcome::Failed { error } => Some(error),
            FrameOutcome::Analyzed { .. } => None,
        }
    }
}

impl Serialize for FrameResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("timestamp", &self.point)?;
        map.serialize_entry("path", &self.path().map(|p| p.to_string_lossy()))?;
        match &self.outcome {
            FrameOutcome::Analyzed { classification, .. } => {
                map.serialize_entry("analysis", classification)?;
            }
            FrameOutcome::Failed { error } => {
                map.serialize_entry("error", &error.to_string())?;
                map.serialize_entry("error_kind", &error.kind())?;
                if let Some(stderr) = error.stderr() {
                    map.serialize_entry("stderr", stderr)?;
                }
                if let Some(detail) = error.detail() {
                    map.serialize_entry("detail", detail)?;
                }
            }
        }
        map.end()
    }
}

/// True when a label belongs to the real (human-made) class.
pub fn is_real_label(label: &str) -> bool {
    label.eq_ignore_ascii_case(HUMAN_LABEL) || label.to_ascii_lowercase().starts_with("real")
}

/// Confidence re-expressed as likelihood of being artificial.
pub fn normalized_score(label: &str, confidence: f64) -> f64 {
    if is_real_label(label) {
        1.0 - confidence
    } else {
        confidence
    }
}

/// Mean artificial-likelihood over analyzed frames; `None` if there are none.
pub fn aggregate_score(results: &[FrameResult]) -> Option<f64> {
    let scores: Vec<f64> = results
        .iter()
        .filter_map(FrameResult::classification)
        .map(|c| normalized_score(&c.label, c.confidence))
        .collect();

    if scores.is_empty() {
        return None;
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Some(round_to(mean, SCORE_DECIMALS))
}

/// Earliest sample point labelled human, in sequence order.
pub fn first_positive_at(results: &[FrameResult]) -> Option<SamplePoint> {
    results
        .iter()
        .find(|r| {
            r.classification()
                .is_some_and(|c| c.label.eq_ignore_ascii_case(HUMAN_LABEL))
        })
        .map(|r| r.point)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictSummary {
    /// Successful analyses only.
    pub frames_analyzed: usize,
    pub labels: Vec<String>,
    /// Every sample point produced a frame and an analysis.
    #[serde(rename = "ffmpeg_ok")]
    pub extraction_healthy: bool,
    #[serde(rename = "first_human_at")]
    pub first_positive_at: Option<SamplePoint>,
    #[serde(rename = "score")]
    pub aggregate_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoVerdict {
    pub frames: Vec<FrameResult>,
    pub summary: VerdictSummary,
    pub no_frames: Option<NoFramesExtracted>,
}

/// The sentinel goes out as `error`, with the tool's diagnostics beside it
/// as `error_detail`.
impl Serialize for VideoVerdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("frames", &self.frames)?;
        map.serialize_entry("summary", &self.summary)?;
        if let Some(sentinel) = &self.no_frames {
            map.serialize_entry("error", &sentinel.to_string())?;
            map.serialize_entry("error_detail", &sentinel.detail)?;
        }
        map.end()
    }
}

impl VideoVerdict {
    pub fn assemble(frames: Vec<FrameResult>, no_frames: Option<NoFramesExtracted>) -> Self {
        let labels: Vec<String> = frames
            .iter()
            .filter_map(FrameResult::classification)
            .map(|c| c.label.clone())
            .collect();

        let extraction_healthy = no_frames.is_none()
            && !frames.is_empty()
            && frames.iter().all(|f| f.error().is_none());

        let summary = VerdictSummary {
            frames_analyzed: labels.len(),
            aggregate_score: aggregate_score(&frames),
            first_positive_at: first_positive_at(&frames),
            extraction_healthy,
            labels,
        };

        Self {
            frames,
            summary,
            no_frames,
        }
    }
}
