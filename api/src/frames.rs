//! Frame extraction
//!
//! Pulls still frames out of a stored video with an external tool (ffmpeg).
//! Every tool failure is captured as data on the returned [`Extraction`];
//! nothing here returns an error to the caller.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{FrameError, NoFramesExtracted};
use crate::sampling::{SamplePoint, SampleSpec};
use crate::workspace::{AnalysisRequest, remove_frame};

const JPEG_QUALITY: &str = "2";

/// Outcome of one invocation of the extraction tool that did start.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRun {
    pub success: bool,
    pub stderr: String,
}

/// External frame-extraction capability.
///
/// `Err` means the tool could not be invoked at all; a tool that ran and
/// failed reports `Ok(ToolRun { success: false, .. })`.
#[async_trait]
pub trait FrameTool: Send + Sync {
    fn name(&self) -> &str;

    /// Write exactly one frame at `secs` into `output`.
    async fn grab_at(&self, video: &Path, secs: f64, output: &Path) -> io::Result<ToolRun>;

    /// Write up to `max_frames` frames, one every `every_n_frames`, using an
    /// image2 `pattern` (`..._%04d.jpg`).
    async fn grab_every(
        &self,
        video: &Path,
        every_n_frames: u32,
        max_frames: u32,
        pattern: &Path,
    ) -> io::Result<ToolRun>;
}

/// ffmpeg driven through `tokio::process`.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: PathBuf,
    threads: usize,
}

impl Ffmpeg {
    pub fn new(binary: impl Into<PathBuf>, threads: usize) -> Self {
        Self {
            binary: binary.into(),
            threads: threads.max(1),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(["-threads", &self.threads.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(mut cmd: Command) -> io::Result<ToolRun> {
        let output = cmd.output().await?;
        Ok(ToolRun {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[async_trait]
impl FrameTool for Ffmpeg {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn grab_at(&self, video: &Path, secs: f64, output: &Path) -> io::Result<ToolRun> {
        let mut cmd = self.command();
        cmd.args(["-ss", &secs.to_string()])
            .arg("-i")
            .arg(video)
            .args(["-frames:v", "1", "-q:v", JPEG_QUALITY, "-y"])
            .arg(output);
        Self::run(cmd).await
    }

    async fn grab_every(
        &self,
        video: &Path,
        every_n_frames: u32,
        max_frames: u32,
        pattern: &Path,
    ) -> io::Result<ToolRun> {
        let select = format!("select=not(mod(n\\,{}))", every_n_frames);
        let mut cmd = self.command();
        cmd.arg("-i")
            .arg(video)
            .args(["-an", "-sn"])
            .args(["-vf", &select])
            .args(["-vsync", "0"])
            .args(["-frames:v", &max_frames.to_string()])
            .args(["-q:v", JPEG_QUALITY, "-y"])
            .arg(pattern);
        Self::run(cmd).await
    }
}

/// One sample point as it came out of the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFrame {
    pub point: SamplePoint,
    pub outcome: Result<PathBuf, FrameError>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// In sample order.
    pub frames: Vec<ExtractedFrame>,
    /// Set only by stride runs that produced nothing.
    pub no_frames: Option<NoFramesExtracted>,
}

#[derive(Clone)]
pub struct FrameExtractor {
    tool: Arc<dyn FrameTool>,
}

impl FrameExtractor {
    pub fn new(tool: Arc<dyn FrameTool>) -> Self {
        Self { tool }
    }

    pub fn tool_name(&self) -> &str {
        self.tool.name()
    }

    pub async fn extract(&self, request: &AnalysisRequest, spec: &SampleSpec) -> Extraction {
        match spec {
            SampleSpec::Timestamps(secs) => self.extract_timestamps(request, secs).await,
            SampleSpec::Stride {
                every_n_frames,
                max_frames,
            } => {
                self.extract_stride(request, *every_n_frames, *max_frames)
                    .await
            }
        }
    }

    async fn extract_timestamps(&self, request: &AnalysisRequest, secs: &[f64]) -> Extraction {
        let tool = self.tool.name().to_string();
        let mut frames = Vec::with_capacity(secs.len());

        for &t in secs {
            let point = SamplePoint::Seconds(t);
            let output = request.frame_path(&point);

            let run = match self.tool.grab_at(&request.video, t, &output).await {
                Ok(run) => run,
                Err(e) => {
                    // The tool won't appear mid-request; stop here.
                    warn!(tool = %tool, error = %e, "Extraction tool unavailable");
                    frames.push(ExtractedFrame {
                        point,
                        outcome: Err(FrameError::ToolUnavailable {
                            tool,
                            detail: e.to_string(),
                        }),
                    });
                    break;
                }
            };

            if !run.success {
                warn!(tool = %tool, %point, stderr = %run.stderr.trim(), "Frame extraction failed");
                frames.push(ExtractedFrame {
                    point,
                    outcome: Err(FrameError::ToolExecutionFailed {
                        tool: tool.clone(),
                        point,
                        stderr: run.stderr,
                    }),
                });
                continue;
            }

            if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
                warn!(tool = %tool, %point, "Tool reported success but wrote no frame");
                frames.push(ExtractedFrame {
                    point,
                    outcome: Err(FrameError::FrameNotProduced { tool: tool.clone() }),
                });
                continue;
            }

            debug!(%point, path = %output.display(), "Extracted frame");
            frames.push(ExtractedFrame {
                point,
                outcome: Ok(output),
            });
        }

        Extraction {
            frames,
            no_frames: None,
        }
    }

    /// Single invocation; any failure yields no frames at all.
    async fn extract_stride(
        &self,
        request: &AnalysisRequest,
        every_n_frames: u32,
        max_frames: u32,
    ) -> Extraction {
        let pattern = request.stride_pattern();
        let prefix = request.stride_prefix();

        let failure = match self
            .tool
            .grab_every(&request.video, every_n_frames, max_frames, &pattern)
            .await
        {
            Ok(run) if run.success => None,
            Ok(run) => Some(format!(
                "{} exited with failure: {}",
                self.tool.name(),
                run.stderr.trim()
            )),
            Err(e) => Some(format!("{} not available: {}", self.tool.name(), e)),
        };

        let mut produced = match collect_frames(&request.frames_dir, &prefix).await {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %request.frames_dir.display(), error = %e, "Failed to list frames");
                Vec::new()
            }
        };

        if let Some(detail) = failure {
            warn!(detail = %detail, "Stride extraction failed");
            for path in &produced {
                remove_frame(path).await;
            }
            return Extraction::no_frames(detail);
        }

        // Anything past the cap is dropped.
        for path in produced.iter().skip(max_frames as usize) {
            remove_frame(path).await;
        }
        produced.truncate(max_frames as usize);

        if produced.is_empty() {
            return Extraction::no_frames(format!("{} produced no frames", self.tool.name()));
        }

        info!(count = produced.len(), every_n_frames, "Extracted frames");
        let frames = produced
            .into_iter()
            .enumerate()
            .map(|(k, path)| ExtractedFrame {
                point: SamplePoint::Frame(k as u64 * every_n_frames as u64),
                outcome: Ok(path),
            })
            .collect();

        Extraction {
            frames,
            no_frames: None,
        }
    }
}

impl Extraction {
    fn no_frames(detail: String) -> Self {
        Self {
            frames: Vec::new(),
            no_frames: Some(NoFramesExtracted { detail }),
        }
    }
}

/// Frame files for one stride run, in output order.
///
/// Ordered by the integer after `prefix`: image2 pads to four digits, so
/// `_10000` must not sort between `_1000` and `_1001`.
async fn collect_frames(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    let mut frame_files: Vec<(u64, PathBuf)> = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(index) = frame_index(&path, prefix) {
            frame_files.push((index, path));
        }
    }
    frame_files.sort_unstable_by_key(|(index, _)| *index);
    Ok(frame_files.into_iter().map(|(_, path)| path).collect())
}

/// Output number of a stride frame, or `None` if `path` is not one.
fn frame_index(path: &Path, prefix: &str) -> Option<u64> {
    if path.extension()? != "jpg" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    stem.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// What the scripted tool does at one timestamp.
    #[derive(Debug, Clone, Copy)]
    pub enum Step {
        Write,
        Fail,
        SucceedWithoutFile,
    }

    /// Scripted stand-in for ffmpeg. Unlisted timestamps write a frame.
    pub struct ScriptedTool {
        pub available: bool,
        pub steps: HashMap<u64, Step>,
        /// Frames written by a stride run, and whether it then reports success.
        pub stride_frames: usize,
        pub stride_success: bool,
        pub calls: Mutex<Vec<f64>>,
    }

    impl ScriptedTool {
        pub fn working() -> Self {
            Self {
                available: true,
                steps: HashMap::new(),
                stride_frames: 0,
                stride_success: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn missing() -> Self {
            Self {
                available: false,
                ..Self::working()
            }
        }

        pub fn with_step(mut self, secs: f64, step: Step) -> Self {
            self.steps.insert(secs.to_bits(), step);
            self
        }

        pub fn calls(&self) -> Vec<f64> {
            self.calls.lock().unwrap().clone()
        }

        fn not_found() -> io::Error {
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory")
        }
    }

    #[async_trait]
    impl FrameTool for ScriptedTool {
        fn name(&self) -> &str {
            "ffmpeg"
        }

        async fn grab_at(&self, _video: &Path, secs: f64, output: &Path) -> io::Result<ToolRun> {
            self.calls.lock().unwrap().push(secs);
            if !self.available {
                return Err(Self::not_found());
            }
            let step = self.steps.get(&secs.to_bits()).copied().unwrap_or(Step::Write);
            match step {
                Step::Write => {
                    tokio::fs::write(output, b"frame").await?;
                    Ok(ToolRun {
                        success: true,
                        stderr: String::new(),
                    })
                }
                Step::Fail => Ok(ToolRun {
                    success: false,
                    stderr: format!("seek past end at {}", secs),
                }),
                Step::SucceedWithoutFile => Ok(ToolRun {
                    success: true,
                    stderr: String::new(),
                }),
            }
        }

        async fn grab_every(
            &self,
            _video: &Path,
            _every_n_frames: u32,
            _max_frames: u32,
            pattern: &Path,
        ) -> io::Result<ToolRun> {
            if !self.available {
                return Err(Self::not_found());
            }
            let pattern = pattern.to_string_lossy().into_owned();
            for k in 1..=self.stride_frames {
                let path = pattern.replace("%04d", &format!("{:04}", k));
                tokio::fs::write(path, b"frame").await?;
            }
            Ok(ToolRun {
                success: self.stride_success,
                stderr: if self.stride_success {
                    String::new()
                } else {
                    "Invalid data found when processing input".into()
                },
            })
        }
    }
}
