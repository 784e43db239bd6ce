use image::{ImageError, ImageReader};
use std::path::Path;

use super::{ARTIFICIAL_LABEL, Classification, HUMAN_LABEL, ImageClassifier};
use crate::error::ClassifierError;

const MODEL_ID: &str = "pads-lite/heuristic";
const LANDSCAPE_SCORE: f64 = 0.82;
const PORTRAIT_SCORE: f64 = 0.77;

/// Dimension-only stand-in for a real model - for lightweight deployments
/// and testing. Landscape reads as artificial, portrait as human.
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageClassifier for HeuristicClassifier {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    fn classify(&self, image: &Path) -> Result<Classification, ClassifierError> {
        let unreadable = |source| ClassifierError::UnreadableImage {
            path: image.to_path_buf(),
            source,
        };
        // Header only, no full decode
        let (width, height) = ImageReader::open(image)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| unreadable(ImageError::IoError(e)))?
            .into_dimensions()
            .map_err(unreadable)?;

        let (label, confidence) = if width >= height {
            (ARTIFICIAL_LABEL, LANDSCAPE_SCORE)
        } else {
            (HUMAN_LABEL, PORTRAIT_SCORE)
        };

        Ok(Classification {
            label: label.to_string(),
            confidence,
            model: MODEL_ID.to_string(),
        })
    }
}
