//! Application constants

/// Maximum upload size for images and videos (200 MB)
pub const MAX_UPLOAD_SIZE: usize = 200 * 1024 * 1024;

/// Directory uploads and extracted frames are written to
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Extension used when an uploaded video has none
pub const DEFAULT_VIDEO_EXT: &str = ".mp4";

/// Sample points used when `SAMPLING` is unset
pub const DEFAULT_SAMPLING: &str = "timestamps:1,2,3";

/// Default Hugging Face repo for the pretrained classifier
pub const DEFAULT_CLASSIFIER_MODEL: &str = "dima806/ai_vs_real_image_detection";

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "pads-api";

/// Decimal places kept on the aggregate score
pub const SCORE_DECIMALS: i32 = 4;
