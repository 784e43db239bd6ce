//! Per-frame analysis: one classifier call, isolated from its siblings.

use std::path::Path;
use std::sync::Arc;

use crate::classifier::{Classification, ImageClassifier};
use crate::error::FrameError;

#[derive(Clone)]
pub struct FrameAnalyzer {
    classifier: Arc<dyn ImageClassifier>,
}

impl FrameAnalyzer {
    pub fn new(classifier: Arc<dyn ImageClassifier>) -> Self {
        Self { classifier }
    }

    pub fn model_id(&self) -> &str {
        self.classifier.model_id()
    }

    /// Classify one frame. Errors, panics and out-of-range confidences all
    /// come back as [`FrameError::ClassificationFailed`].
    pub async fn analyze(&self, frame: &Path) -> Result<Classification, FrameError> {
        let classifier = Arc::clone(&self.classifier);
        let path = frame.to_path_buf();

        let result = tokio::task::spawn_blocking(move || classifier.classify(&path))
            .await
            .map_err(|e| FrameError::ClassificationFailed(format!("classifier panicked: {}", e)))?
            .map_err(|e| FrameError::ClassificationFailed(e.to_string()))?;

        if !(0.0..=1.0).contains(&result.confidence) {
            return Err(FrameError::ClassificationFailed(format!(
                "confidence {} outside [0, 1]",
                result.confidence
            )));
        }

        Ok(result)
    }
}
