//! Local storage for uploaded media.
//!
//! Uploads are written under the upload directory with a timestamped name;
//! extracted frames for a video land in the same directory so the static
//! `/uploads` route can serve them.

use std::path::{Path, PathBuf};

use crate::workspace::{random_token, request_stamp};

/// An upload persisted to disk.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub original_name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Write `data` as `<dir>/<stamp>_<token><ext>`, keeping the original extension
/// (or `default_ext` when there is none).
pub async fn save_upload(
    dir: &Path,
    original_name: &str,
    data: &[u8],
    default_ext: &str,
) -> std::io::Result<StoredUpload> {
    tokio::fs::create_dir_all(dir).await?;

    let ext = upload_extension(original_name, default_ext);
    let path = dir.join(format!("{}_{}{}", request_stamp(), random_token(), ext));
    tokio::fs::write(&path, data).await?;

    Ok(StoredUpload {
        original_name: original_name.to_string(),
        path,
        size: data.len() as u64,
    })
}

/// Extension with its leading dot, e.g. `.mp4`.
fn upload_extension(original_name: &str, default_ext: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| default_ext.to_string())
}
