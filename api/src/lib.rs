//! PADS media analysis service.
//!
//! Videos are sampled into still frames with ffmpeg, each frame is scored by
//! a pluggable image classifier as human-made or AI-generated, and the
//! per-frame results are folded into a single verdict.

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod frames;
pub mod orchestrator;
pub mod routes;
pub mod sampling;
pub mod services;
pub mod storage;
pub mod verdict;
pub mod workspace;

use std::sync::Arc;

use analyzer::FrameAnalyzer;
use classifier::ImageClassifier;
use config::Settings;
use frames::{Ffmpeg, FrameExtractor, FrameTool};
use orchestrator::VideoAnalyzer;

/// Shared across handlers. Owns the classifier for the life of the process.
pub struct AppState {
    pub settings: Settings,
    pub analyzer: VideoAnalyzer,
}

impl AppState {
    pub fn new(
        settings: Settings,
        classifier: Arc<dyn ImageClassifier>,
        tool: Arc<dyn FrameTool>,
    ) -> Self {
        let mut analyzer = VideoAnalyzer::new(
            FrameExtractor::new(tool),
            FrameAnalyzer::new(classifier),
            settings.sampling.clone(),
        );
        if !settings.keep_frames {
            analyzer = analyzer.discard_frames();
        }
        Self { settings, analyzer }
    }

    /// Load the configured classifier and wire up ffmpeg.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let classifier =
            classifier::load_classifier(settings.classifier, &settings.classifier_model)?;
        let ffmpeg = Ffmpeg::new(&settings.ffmpeg_bin, settings.ffmpeg_threads);
        Ok(Self::new(settings, classifier, Arc::new(ffmpeg)))
    }
}
