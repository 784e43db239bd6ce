use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::classifier::ClassifierKind;
use crate::constants::{
    DEFAULT_CLASSIFIER_MODEL, DEFAULT_SAMPLING, DEFAULT_UPLOAD_DIR, MAX_UPLOAD_SIZE,
};
use crate::sampling::{SampleSpec, SampleSpecError};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_FFMPEG_THREADS: usize = 1;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://127.0.0.1:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("SAMPLING: {0}")]
    Sampling(#[from] SampleSpecError),
}

/// Service configuration loaded from environment variables.
///
/// | Env Var            | Default                                       |
/// |--------------------|-----------------------------------------------|
/// | `HOST`             | `0.0.0.0`                                     |
/// | `PORT`             | `8000`                                        |
/// | `UPLOAD_DIR`       | `uploads`                                     |
/// | `FFMPEG_BIN`       | `ffmpeg`                                      |
/// | `FFMPEG_THREADS`   | `1`                                           |
/// | `SAMPLING`         | `timestamps:1,2,3` (or e.g. `stride:30:10`)   |
/// | `CLASSIFIER`       | `heuristic` (or `vit`)                        |
/// | `CLASSIFIER_MODEL` | `dima806/ai_vs_real_image_detection`          |
/// | `KEEP_FRAMES`      | `true`                                        |
/// | `MAX_UPLOAD_BYTES` | `209715200`                                   |
/// | `CORS_ORIGINS`     | `http://localhost:5173,http://127.0.0.1:5173` |
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub ffmpeg_bin: PathBuf,
    pub ffmpeg_threads: usize,
    pub sampling: SampleSpec,
    pub classifier: ClassifierKind,
    pub classifier_model: String,
    pub keep_frames: bool,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffmpeg_threads: DEFAULT_FFMPEG_THREADS,
            sampling: SampleSpec::default(),
            classifier: ClassifierKind::Heuristic,
            classifier_model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            keep_frames: true,
            max_upload_bytes: MAX_UPLOAD_SIZE,
            cors_origins: split_origins(DEFAULT_CORS_ORIGINS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from any key lookup; unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let sampling: SampleSpec = match var("SAMPLING") {
            Some(rule) => rule.parse()?,
            None => DEFAULT_SAMPLING.parse()?,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", var("PORT"))?.unwrap_or(defaults.port),
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            ffmpeg_bin: var("FFMPEG_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_bin),
            ffmpeg_threads: parse_positive("FFMPEG_THREADS", var("FFMPEG_THREADS"))?
                .unwrap_or(defaults.ffmpeg_threads),
            sampling,
            classifier: match var("CLASSIFIER") {
                Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                    name: "CLASSIFIER",
                    value,
                })?,
                None => defaults.classifier,
            },
            classifier_model: var("CLASSIFIER_MODEL").unwrap_or(defaults.classifier_model),
            keep_frames: parse_var("KEEP_FRAMES", var("KEEP_FRAMES"))?
                .unwrap_or(defaults.keep_frames),
            max_upload_bytes: parse_positive("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"))?
                .unwrap_or(defaults.max_upload_bytes),
            cors_origins: var("CORS_ORIGINS")
                .map(|v| split_origins(&v))
                .unwrap_or(defaults.cors_origins),
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value: v })
        })
        .transpose()
}

/// Like [`parse_var`], but zero is rejected too.
fn parse_positive(name: &'static str, value: Option<String>) -> Result<Option<usize>, ConfigError> {
    match parse_var::<usize>(name, value.clone())? {
        Some(0) => Err(ConfigError::Invalid {
            name,
            value: value.unwrap_or_default(),
        }),
        parsed => Ok(parsed),
    }
}

fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
