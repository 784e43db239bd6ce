//! Upload and analysis endpoints (/upload, /analyze/*)

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::AppState;
use crate::classifier::Classification;
use crate::constants::DEFAULT_VIDEO_EXT;
use crate::services::error::{ApiError, LogErr};
use crate::storage::{StoredUpload, save_upload};
use crate::verdict::VideoVerdict;
use crate::workspace::AnalysisRequest;

const FILE_FIELD: &str = "file";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload))
        .route("/analyze/image", post(analyze_image))
        .route("/analyze/video", post(analyze_video))
}

/// Pull the `file` field out of a multipart body.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .log_status("Multipart field error", StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .log_status("Failed to read upload", StatusCode::BAD_REQUEST)?;

        if data.is_empty() {
            break;
        }
        return Ok((filename, data));
    }

    Err(ApiError::bad_request("No file uploaded"))
}

async fn store(
    state: &AppState,
    multipart: &mut Multipart,
    default_ext: &str,
) -> Result<StoredUpload, ApiError> {
    let (filename, data) = read_file_field(multipart).await?;
    save_upload(&state.settings.upload_dir, &filename, &data, default_ext)
        .await
        .log_500("Failed to store upload")
}

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    filename: String,
    saved_as: String,
    size: u64,
}

/// POST /upload - Store a file without analysing it
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let stored = store(&state, &mut multipart, "").await?;

    Ok(Json(UploadResponse {
        message: "file uploaded",
        filename: stored.original_name,
        saved_as: stored.path.to_string_lossy().into_owned(),
        size: stored.size,
    }))
}

#[derive(Serialize)]
struct ImageAnalysisResponse {
    filename: String,
    stored_at: String,
    analysis: Classification,
}

/// POST /analyze/image - Store and classify one image
async fn analyze_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ImageAnalysisResponse>, ApiError> {
    let stored = store(&state, &mut multipart, "").await?;

    let analysis = state
        .analyzer
        .analyze_image(&stored.path)
        .await
        .log_500("Analysis error")?;

    info!(
        image = %stored.path.display(),
        label = %analysis.label,
        score = analysis.confidence,
        "Image analyzed"
    );

    Ok(Json(ImageAnalysisResponse {
        filename: stored.original_name,
        stored_at: stored.path.to_string_lossy().into_owned(),
        analysis,
    }))
}

#[derive(Serialize)]
struct VideoAnalysisResponse {
    filename: String,
    stored_at: String,
    #[serde(flatten)]
    verdict: VideoVerdict,
}

/// POST /analyze/video - Store a video, sample frames, classify each.
/// Frame-level failures are reported in the body, never as an error status.
async fn analyze_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<VideoAnalysisResponse>, ApiError> {
    let stored = store(&state, &mut multipart, DEFAULT_VIDEO_EXT).await?;

    let request = AnalysisRequest::new(&stored.path, &state.settings.upload_dir);
    let verdict = state
        .analyzer
        .analyze_video(&request)
        .await
        .log_500("Video analysis error")?;

    Ok(Json(VideoAnalysisResponse {
        filename: stored.original_name,
        stored_at: stored.path.to_string_lossy().into_owned(),
        verdict,
    }))
}
