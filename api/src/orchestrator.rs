//! Video analysis: extract frames, classify each in order, aggregate.

use std::path::Path;
use tracing::{info, warn};

use crate::analyzer::FrameAnalyzer;
use crate::classifier::Classification;
use crate::error::{AnalysisError, FrameError};
use crate::frames::FrameExtractor;
use crate::sampling::SampleSpec;
use crate::verdict::{FrameResult, VideoVerdict};
use crate::workspace::{AnalysisRequest, remove_frame};

#[derive(Clone)]
pub struct VideoAnalyzer {
    extractor: FrameExtractor,
    analyzer: FrameAnalyzer,
    sampling: SampleSpec,
    keep_frames: bool,
}

impl VideoAnalyzer {
    pub fn new(extractor: FrameExtractor, analyzer: FrameAnalyzer, sampling: SampleSpec) -> Self {
        Self {
            extractor,
            analyzer,
            sampling,
            keep_frames: true,
        }
    }

    /// Delete analyzed frames once the verdict is built.
    pub fn discard_frames(mut self) -> Self {
        self.keep_frames = false;
        self
    }

    pub fn sampling(&self) -> &SampleSpec {
        &self.sampling
    }

    pub fn model_id(&self) -> &str {
        self.analyzer.model_id()
    }

    /// Best-effort verdict for one video. Fails only if the video itself
    /// cannot be read; every other failure is recorded on the frames.
    pub async fn analyze_video(
        &self,
        request: &AnalysisRequest,
    ) -> Result<VideoVerdict, AnalysisError> {
        let unreadable = |source| AnalysisError::VideoUnreadable {
            path: request.video.clone(),
            source,
        };
        let metadata = tokio::fs::metadata(&request.video)
            .await
            .map_err(unreadable)?;
        if !metadata.is_file() {
            return Err(unreadable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        let extraction = self.extractor.extract(request, &self.sampling).await;

        let mut results = Vec::with_capacity(extraction.frames.len());
        for frame in extraction.frames {
            let path = match frame.outcome {
                Ok(path) => path,
                Err(error) => {
                    results.push(FrameResult::failed(frame.point, error));
                    continue;
                }
            };

            match self.analyzer.analyze(&path).await {
                Ok(classification) => {
                    results.push(FrameResult::analyzed(frame.point, path, classification));
                }
                Err(error) => {
                    warn!(point = %frame.point, error = %error, "Frame analysis failed");
                    remove_frame(&path).await;
                    results.push(FrameResult::failed(frame.point, error));
                }
            }
        }

        let verdict = VideoVerdict::assemble(results, extraction.no_frames);

        if !self.keep_frames {
            for path in verdict.frames.iter().filter_map(FrameResult::path) {
                remove_frame(path).await;
            }
        }

        info!(
            video = %request.video.display(),
            tool = self.extractor.tool_name(),
            frames = verdict.frames.len(),
            analyzed = verdict.summary.frames_analyzed,
            healthy = verdict.summary.extraction_healthy,
            score = ?verdict.summary.aggregate_score,
            "Video analyzed"
        );

        Ok(verdict)
    }

    /// Classify a single stored image.
    pub async fn analyze_image(&self, image: &Path) -> Result<Classification, FrameError> {
        self.analyzer.analyze(image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::testing::ContentClassifier;
    use crate::classifier::HeuristicClassifier;
    use crate::error::FrameErrorKind;
    use crate::frames::testing::{ScriptedTool, Step};
    use crate::frames::{FrameTool, ToolRun};
    use crate::sampling::SamplePoint;
    use async_trait::async_trait;
    use std::io;
    use std::sync::Arc;

    /// Writes a frame whose content tells [`ContentClassifier`] what to say.
    struct LabelledTool(Vec<(f64, &'static str)>);

    #[async_trait]
    impl FrameTool for LabelledTool {
        fn name(&self) -> &str {
            "ffmpeg"
        }

        async fn grab_at(&self, _video: &Path, secs: f64, output: &Path) -> io::Result<ToolRun> {
            let body = self
                .0
                .iter()
                .find(|(t, _)| *t == secs)
                .map(|(_, body)| *body)
                .unwrap_or("artificial:0.5");
            tokio::fs::write(output, body).await?;
            Ok(ToolRun {
                success: true,
                stderr: String::new(),
            })
        }

        async fn grab_every(
            &self,
            _video: &Path,
            _every_n_frames: u32,
            _max_frames: u32,
            _pattern: &Path,
        ) -> io::Result<ToolRun> {
            Ok(ToolRun {
                success: false,
                stderr: "unsupported".into(),
            })
        }
    }

    fn video_in(dir: &tempfile::TempDir) -> AnalysisRequest {
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        AnalysisRequest::new(video, dir.path())
    }

    fn analyzer(tool: impl FrameTool + 'static, sampling: SampleSpec) -> VideoAnalyzer {
        VideoAnalyzer::new(
            FrameExtractor::new(Arc::new(tool)),
            FrameAnalyzer::new(Arc::new(ContentClassifier)),
            sampling,
        )
    }

    #[tokio::test]
    async fn test_tool_unavailable_yields_single_error_entry() {
        let dir = tempfile::tempdir().unwrap();
        let verdict = analyzer(ScriptedTool::missing(), SampleSpec::default())
            .analyze_video(&video_in(&dir))
            .await
            .unwrap();

        assert_eq!(verdict.frames.len(), 1);
        assert_eq!(verdict.frames[0].point, SamplePoint::Seconds(1.0));
        assert_eq!(
            verdict.frames[0].error().map(FrameError::kind),
            Some(FrameErrorKind::ToolUnavailable)
        );
        assert!(!verdict.summary.extraction_healthy);
        assert_eq!(verdict.summary.frames_analyzed, 0);
        assert_eq!(verdict.summary.aggregate_score, None);
        assert_eq!(verdict.summary.first_positive_at, None);
    }

    #[tokio::test]
    async fn test_tool_failure_mid_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let tool = LabelledTool(vec![(1.0, "artificial:0.82"), (3.0, "human:0.77")]);
        let failing = ScriptedTool::working().with_step(2.0, Step::Fail);

        // real frames from LabelledTool except at t=2
        struct Mixed(LabelledTool, ScriptedTool);

        #[async_trait]
        impl FrameTool for Mixed {
            fn name(&self) -> &str {
                "ffmpeg"
            }

            async fn grab_at(&self, video: &Path, secs: f64, output: &Path) -> io::Result<ToolRun> {
                if secs == 2.0 {
                    self.1.grab_at(video, secs, output).await
                } else {
                    self.0.grab_at(video, secs, output).await
                }
            }

            async fn grab_every(
                &self,
                video: &Path,
                every_n_frames: u32,
                max_frames: u32,
                pattern: &Path,
            ) -> io::Result<ToolRun> {
                self.0
                    .grab_every(video, every_n_frames, max_frames, pattern)
                    .await
            }
        }

        let verdict = analyzer(Mixed(tool, failing), SampleSpec::default())
            .analyze_video(&video_in(&dir))
            .await
            .unwrap();

        assert_eq!(verdict.frames.len(), 3);
        assert!(verdict.frames[0].classification().is_some());
        assert_eq!(
            verdict.frames[1].error().map(FrameError::kind),
            Some(FrameErrorKind::ToolExecutionFailed)
        );
        assert!(verdict.frames[2].classification().is_some());
        assert!(!verdict.summary.extraction_healthy);
        assert_eq!(verdict.summary.frames_analyzed, 2);
        assert_eq!(verdict.summary.labels, vec!["artificial", "human"]);
        assert_eq!(verdict.summary.aggregate_score, Some(0.525));
        assert_eq!(
            verdict.summary.first_positive_at,
            Some(SamplePoint::Seconds(3.0))
        );
    }

    #[tokio::test]
    async fn test_classifier_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let tool = LabelledTool(vec![
            (1.0, "human:0.9"),
            (2.0, "panic"),
            (3.0, "artificial:0.8"),
        ]);

        let verdict = analyzer(tool, SampleSpec::default())
            .analyze_video(&video_in(&dir))
            .await
            .unwrap();

        assert_eq!(verdict.frames.len(), 3);
        assert_eq!(
            verdict.frames[1].error().map(FrameError::kind),
            Some(FrameErrorKind::ClassificationFailed)
        );
        assert_eq!(verdict.frames[1].path(), None);
        assert_eq!(verdict.summary.frames_analyzed, 2);
        assert!(!verdict.summary.extraction_healthy);
        // (0.1 + 0.8) / 2
        assert_eq!(verdict.summary.aggregate_score, Some(0.45));
        assert_eq!(
            verdict.summary.first_positive_at,
            Some(SamplePoint::Seconds(1.0))
        );
    }

    #[tokio::test]
    async fn test_failed_frames_are_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let tool = LabelledTool(vec![(1.0, "garbage"), (2.0, "garbage"), (3.0, "garbage")]);
        let request = video_in(&dir);

        let verdict = analyzer(tool, SampleSpec::default())
            .analyze_video(&request)
            .await
            .unwrap();

        assert_eq!(verdict.summary.frames_analyzed, 0);
        // Only the video itself is left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_all_frames_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let verdict = analyzer(LabelledTool(vec![]), SampleSpec::default())
            .analyze_video(&video_in(&dir))
            .await
            .unwrap();

        assert!(verdict.summary.extraction_healthy);
        assert_eq!(verdict.summary.frames_analyzed, 3);
        assert_eq!(verdict.summary.aggregate_score, Some(0.5));
        for frame in &verdict.frames {
            assert!(frame.path().unwrap().exists());
        }
    }

    #[tokio::test]
    async fn test_discard_frames_removes_analyzed_files() {
        let dir = tempfile::tempdir().unwrap();
        let verdict = analyzer(LabelledTool(vec![]), SampleSpec::default())
            .discard_frames()
            .analyze_video(&video_in(&dir))
            .await
            .unwrap();

        assert_eq!(verdict.summary.frames_analyzed, 3);
        for frame in &verdict.frames {
            assert!(!frame.path().unwrap().exists());
        }
    }

    #[tokio::test]
    async fn test_stride_without_frames_sets_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let verdict = analyzer(LabelledTool(vec![]), SampleSpec::stride(30, 10).unwrap())
            .analyze_video(&video_in(&dir))
            .await
            .unwrap();

        assert!(verdict.frames.is_empty());
        assert!(verdict.no_frames.is_some());
        assert_eq!(verdict.summary.aggregate_score, None);
    }

    #[tokio::test]
    async fn test_stride_frames_are_analyzed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ScriptedTool {
            stride_frames: 2,
            ..ScriptedTool::working()
        };
        // ScriptedTool writes "frame", which the heuristic cannot decode
        let video = VideoAnalyzer::new(
            FrameExtractor::new(Arc::new(tool)),
            FrameAnalyzer::new(Arc::new(HeuristicClassifier::new())),
            SampleSpec::stride(15, 5).unwrap(),
        );

        let verdict = video.analyze_video(&video_in(&dir)).await.unwrap();

        let points: Vec<_> = verdict.frames.iter().map(|f| f.point).collect();
        assert_eq!(points, vec![SamplePoint::Frame(0), SamplePoint::Frame(15)]);
        assert!(verdict.frames.iter().all(|f| f.error().is_some()));
        assert!(verdict.no_frames.is_none());
    }

    #[tokio::test]
    async fn test_missing_video_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let request = AnalysisRequest::new(dir.path().join("gone.mp4"), dir.path());

        let result = analyzer(ScriptedTool::working(), SampleSpec::default())
            .analyze_video(&request)
            .await;

        assert!(matches!(result, Err(AnalysisError::VideoUnreadable { .. })));
    }

    #[tokio::test]
    async fn test_directory_is_not_a_video() {
        let dir = tempfile::tempdir().unwrap();
        let request = AnalysisRequest::new(dir.path(), dir.path());

        let result = analyzer(ScriptedTool::working(), SampleSpec::default())
            .analyze_video(&request)
            .await;

        assert!(matches!(result, Err(AnalysisError::VideoUnreadable { .. })));
    }
}
