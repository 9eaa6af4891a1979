//! Project handlers: creation, listing, asset registration, batch runs.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use vlogkit_media::{ensure_safe_name, probe_raw};
use vlogkit_models::Transform;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::batch::{run_batch, BatchOperationRequest};
use crate::services::{require_project_owner, require_self};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<Json<Value>> {
    if request.title.trim().is_empty() {
        return Err(ApiError::malformed("project title is required"));
    }

    let project = state
        .store
        .create_project(user.id, request.title.trim(), &request.description)
        .await?;

    info!(project_id = project.id, user_id = user.id, "project created");
    Ok(Json(json!({
        "message": "project created",
        "project_id": project.id,
        "title": project.title,
        "created_at": project.created_at,
    })))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let project = require_project_owner(&state.store, project_id, &user).await?;
    let videos = state.store.list_assets(project_id).await?;

    Ok(Json(json!({
        "project_id": project.id,
        "title": project.title,
        "description": project.description,
        "video_files": videos,
        "audio_files": [],
        "created_at": project.created_at,
        "updated_at": project.updated_at,
    })))
}

pub async fn list_user_projects(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    require_self(&user, user_id)?;

    let projects = state.store.list_user_projects(user_id).await?;
    Ok(Json(json!({
        "user_id": user_id,
        "total_projects": projects.len(),
        "projects": projects,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AddVideoRequest {
    pub filename: String,
}

/// Decode a filename as it appears in upload URLs and require it to be a
/// bare name. Anything with separators or `..` cannot have come from the
/// upload endpoint and must not be joined onto the upload directory.
fn decoded_safe_filename(raw: &str) -> ApiResult<String> {
    let filename = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    ensure_safe_name(&filename)?;
    Ok(filename)
}

/// Register an already-uploaded file as a project asset after probing it.
pub async fn add_video(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    AuthUser(user): AuthUser,
    Json(request): Json<AddVideoRequest>,
) -> ApiResult<Json<Value>> {
    require_project_owner(&state.store, project_id, &user).await?;

    let filename = decoded_safe_filename(&request.filename)?;

    let file_path = state.config.upload_dir.join(&filename);
    if !tokio::fs::try_exists(&file_path).await.unwrap_or(false) {
        return Err(ApiError::not_found(format!(
            "video file not found: {}",
            filename
        )));
    }

    // Full ffprobe output becomes the asset's metadata blob.
    let metadata = probe_raw(&file_path).await?;
    let duration = metadata
        .pointer("/format/duration")
        .and_then(Value::as_str)
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);
    let file_size = tokio::fs::metadata(&file_path).await?.len() as i64;

    let asset = state
        .store
        .add_asset(
            project_id,
            &filename,
            &file_path.to_string_lossy(),
            duration,
            file_size,
            &metadata,
        )
        .await?;

    Ok(Json(json!({
        "message": "video added to project",
        "project_id": project_id,
        "video_file": asset,
    })))
}

pub async fn list_project_videos(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    require_project_owner(&state.store, project_id, &user).await?;

    let videos = state.store.list_assets(project_id).await?;
    Ok(Json(json!({
        "project_id": project_id,
        "total_videos": videos.len(),
        "videos": videos,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub operations: Vec<Value>,
}

pub async fn batch_process(
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    AuthUser(user): AuthUser,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<Value>> {
    require_project_owner(&state.store, project_id, &user).await?;

    // Shape errors are MalformedInput; a known shape with a value outside the
    // supported set is UnsupportedOption (via TryFrom).
    let mut operations = Vec::with_capacity(request.operations.len());
    for raw in request.operations {
        let parsed: BatchOperationRequest = serde_json::from_value(raw)
            .map_err(|e| ApiError::malformed(format!("invalid operation: {}", e)))?;
        let kind = parsed.kind().to_string();
        operations.push((kind, Transform::try_from(parsed)?));
    }

    let report = run_batch(&state.store, state.engine.as_ref(), project_id, &operations).await?;

    Ok(Json(json!({
        "message": "batch processing complete",
        "project_id": project_id,
        "processed_files": report.processed_files,
        "results": report.results,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_filenames_are_rejected_before_any_path_join() {
        for raw in [
            "..%2F..%2Fhome%2Fx%2Fv.mp4",
            "../secret.mp4",
            "a%5Cb.mp4",
            "%2Fetc%2Fpasswd",
        ] {
            let err = decoded_safe_filename(raw).unwrap_err();
            assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn percent_encoded_names_decode_to_the_stored_name() {
        assert_eq!(
            decoded_safe_filename("my%20video.mp4").unwrap(),
            "my video.mp4"
        );
        assert_eq!(decoded_safe_filename("trip_day-1.mp4").unwrap(), "trip_day-1.mp4");
    }
}
