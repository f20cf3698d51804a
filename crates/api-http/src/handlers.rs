//! Route Handlers
//!
//! Thin translation from HTTP to registry and intake calls. Every lookup is scoped to the
//! caller's session; a foreign job is reported exactly like a missing one.

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use crate::types::{ClearResponse, HealthResponse, JobsResponse, MessageResponse, UploadResponse};
use axum::body::Body;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use mediapress_core::application::UploadRequest;
use mediapress_core::domain::{Job, JobView, SessionId};
use mediapress_core::port::{CompressionError, MediaCapabilities};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const JOB_NOT_FOUND: &str = "Job not found";

fn find_job(state: &ApiState, id: &str, session: &SessionId) -> ApiResult<Job> {
    state
        .registry
        .get(id, Some(session))
        .ok_or_else(|| ApiError::NotFound(JOB_NOT_FOUND.to_string()))
}

fn too_large(state: &ApiState) -> ApiError {
    ApiError::BadRequest(format!(
        "File too large. Maximum size is {}MB",
        state.intake.policy().max_file_size_mb
    ))
}

fn multipart_error(state: &ApiState, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(state)
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// POST /upload
pub async fn upload(
    State(state): State<ApiState>,
    Extension(session): Extension<SessionId>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let max_bytes = state.intake.policy().max_bytes();
    let mut filename = String::new();
    let mut content = Vec::new();
    let mut preset = None;
    let mut image_format = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&state, e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().unwrap_or_default().to_string();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| multipart_error(&state, e))?
                {
                    if (content.len() + chunk.len()) as u64 > max_bytes {
                        return Err(too_large(&state));
                    }
                    content.extend_from_slice(&chunk);
                }
            }
            "preset" => {
                preset = Some(field.text().await.map_err(|e| multipart_error(&state, e))?)
            }
            "image_format" => {
                image_format = Some(field.text().await.map_err(|e| multipart_error(&state, e))?)
            }
            _ => {}
        }
    }

    let job = state
        .intake
        .accept(UploadRequest {
            session_id: session,
            filename,
            content,
            preset,
            image_format,
        })
        .await?;

    Ok(Json(UploadResponse {
        job_id: job.id,
        message: "Upload successful, processing started".to_string(),
    }))
}

/// GET /job/{id}
pub async fn get_job(
    State(state): State<ApiState>,
    Extension(session): Extension<SessionId>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobView>> {
    Ok(Json(find_job(&state, &id, &session)?.view()))
}

/// DELETE /job/{id}
pub async fn delete_job(
    State(state): State<ApiState>,
    Extension(session): Extension<SessionId>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    if !state.registry.delete(&id, Some(&session)).await {
        return Err(ApiError::NotFound(JOB_NOT_FOUND.to_string()));
    }
    Ok(Json(MessageResponse {
        message: "Job deleted".to_string(),
    }))
}

/// GET /jobs
pub async fn list_jobs(
    State(state): State<ApiState>,
    Extension(session): Extension<SessionId>,
) -> Json<JobsResponse> {
    Json(JobsResponse {
        jobs: state.registry.list(Some(&session)),
    })
}

/// DELETE /jobs
pub async fn clear_jobs(
    State(state): State<ApiState>,
    Extension(session): Extension<SessionId>,
) -> Json<ClearResponse> {
    let cleared = state.registry.clear_all(Some(&session)).await;
    info!(session = %session, cleared, "Cleared session jobs");
    Json(ClearResponse {
        message: format!("Cleared {cleared} jobs"),
        cleared,
    })
}

fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename.replace('"', ""))
}

/// GET /download/{id}
pub async fn download(
    State(state): State<ApiState>,
    Extension(session): Extension<SessionId>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let job = find_job(&state, &id, &session)?;
    let (Some(path), true) = (job.output_path.as_ref(), job.is_download_ready()) else {
        return Err(ApiError::BadRequest("File not ready for download".to_string()));
    };

    // The record can outlive its file (manual cleanup, disk trouble)
    let file = match state.file_store.open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(job_id = %job.id, path = %path.display(), "Completed output missing on disk");
            return Err(ApiError::NotFound("Compressed file not found".to_string()));
        }
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };

    let filename = job.output_filename().unwrap_or_else(|| job.id.clone());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, attachment(&filename))
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Deflated archive of already loaded files
fn build_archive(entries: Vec<(String, Vec<u8>)>) -> std::io::Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in entries {
        writer.start_file(name, options).map_err(std::io::Error::other)?;
        writer.write_all(&bytes)?;
    }

    let cursor = writer.finish().map_err(std::io::Error::other)?;
    Ok(cursor.into_inner())
}

/// GET /download-all
pub async fn download_all(
    State(state): State<ApiState>,
    Extension(session): Extension<SessionId>,
) -> ApiResult<Response> {
    let entries: Vec<(PathBuf, String)> = state
        .registry
        .snapshot(Some(&session))
        .into_iter()
        .filter(Job::is_download_ready)
        .filter_map(|job| Some((job.output_path.clone()?, job.output_filename()?)))
        .collect();

    if entries.is_empty() {
        return Err(ApiError::BadRequest(
            "No completed files to download".to_string(),
        ));
    }

    // Entries whose file vanished from disk are skipped
    let mut loaded = Vec::with_capacity(entries.len());
    for (path, name) in entries {
        match state.file_store.read(&path).await {
            Ok(bytes) => loaded.push((name, bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(session = %session, path = %path.display(), "Completed output missing on disk, skipping");
            }
            Err(e) => return Err(ApiError::Internal(e.to_string())),
        }
    }
    let added = loaded.len();

    let archive = tokio::task::spawn_blocking(move || build_archive(loaded))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(session = %session, files = added, bytes = archive.len(), "Built bulk download");

    let filename = format!(
        "compressed_{}.zip",
        chrono::Local::now().format("%Y%m%d_%H%M")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
        ],
        archive,
    )
        .into_response())
}

/// GET /thumbnail/{id}
pub async fn thumbnail(
    State(state): State<ApiState>,
    Extension(session): Extension<SessionId>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let job = find_job(&state, &id, &session)?;
    if !state.file_store.exists(&job.source_path).await {
        return Err(ApiError::NotFound("Original file not found".to_string()));
    }

    match state.thumbnailer.thumbnail(&job.source_path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_ext("jpg").first_or_octet_stream();
            Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response())
        }
        Err(CompressionError::UnsupportedMedia(_)) => Err(ApiError::BadRequest(
            "Cannot generate thumbnail for this file type".to_string(),
        )),
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Thumbnail generation failed");
            Err(ApiError::Unprocessed(format!(
                "Thumbnail generation failed: {e}"
            )))
        }
    }
}

/// GET /health
pub async fn health(State(capabilities): State<MediaCapabilities>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        ffmpeg_available: capabilities.ffmpeg_available,
        heic_support: capabilities.heic_support,
    })
}
