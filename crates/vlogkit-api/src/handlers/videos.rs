//! Upload, inspection and single-transformation handlers.
//!
//! Every transform endpoint follows the same cycle: optional ownership check,
//! one planner+executor run, and a response naming the source, the derived
//! file and the registered asset (when a project was attached).

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;

use vlogkit_media::probe_video;
use vlogkit_models::{SubtitleEntry, Transform, User};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::require_project_owner;
use crate::services::transform::{SourceFile, TransformOutcome};
use crate::state::AppState;

/// Keep only characters the planner's filename guard accepts: alphanumerics
/// (any script) plus space, dash, underscore and dot. Dot runs collapse to a
/// single dot so `..` can never survive, keeping every stored name usable as
/// a transform source.
fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
            out.push(c);
        } else if c == '.' && !out.ends_with('.') {
            out.push(c);
        }
    }
    out.trim_end().to_string()
}

pub async fn upload_video(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::malformed(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("video/") {
            return Err(ApiError::malformed("only video files can be uploaded"));
        }

        let original = field.file_name().unwrap_or_default().to_string();
        let filename = sanitize_filename(&original);
        if filename.is_empty() || filename.starts_with('.') {
            return Err(ApiError::malformed(format!(
                "invalid filename: {}",
                original
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::malformed(e.to_string()))?;
        let path = state.config.upload_dir.join(&filename);
        tokio::fs::write(&path, &data).await?;

        info!(filename = %filename, size = data.len(), "video uploaded");
        return Ok(Json(json!({
            "message": "video uploaded",
            "filename": filename,
            "file_size": data.len(),
            "file_path": path.to_string_lossy(),
        })));
    }

    Err(ApiError::malformed("missing 'file' field"))
}

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub filename: String,
}

pub async fn video_info(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(query): Query<InfoQuery>,
) -> ApiResult<Json<Value>> {
    let path = state.config.upload_dir.join(&query.filename);
    let summary = probe_video(&path).await?;

    let mut body = serde_json::to_value(&summary)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    body["filename"] = json!(query.filename);
    Ok(Json(body))
}

/// Ownership check (when a project is attached) plus one executor run.
async fn run_transform(
    state: &AppState,
    user: &User,
    project_id: Option<i64>,
    filename: &str,
    transform: Transform,
) -> ApiResult<TransformOutcome> {
    if let Some(id) = project_id {
        require_project_owner(&state.store, id, user).await?;
    }
    state
        .engine
        .execute(&SourceFile::untracked(filename), &transform, project_id)
        .await
}

/// Response body shared by the transform endpoints; `output_key` is the
/// endpoint-specific name for the derived file.
fn transform_response(
    message: &str,
    original_file: &str,
    output_key: &str,
    outcome: &TransformOutcome,
    project_id: Option<i64>,
    extra: Value,
) -> Json<Value> {
    let mut body = Map::new();
    body.insert("message".to_string(), json!(message));
    body.insert("original_file".to_string(), json!(original_file));
    body.insert(output_key.to_string(), json!(outcome.output_filename));
    body.insert(
        "output_path".to_string(),
        json!(outcome.output_path.to_string_lossy()),
    );
    body.insert("project_id".to_string(), json!(project_id));
    body.insert(
        "added_to_project".to_string(),
        json!(outcome.asset.is_some()),
    );
    body.insert(
        "video_id".to_string(),
        json!(outcome.asset.as_ref().map(|a| a.id)),
    );
    if let Value::Object(extra) = extra {
        body.extend(extra);
    }
    Json(Value::Object(body))
}

#[derive(Debug, Deserialize)]
pub struct ClipRequest {
    pub filename: String,
    pub start_time: f64,
    pub end_time: f64,
    pub project_id: Option<i64>,
}

pub async fn clip_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ClipRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::Clip {
        start: req.start_time,
        end: req.end_time,
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "video clipped",
        &req.filename,
        "clipped_file",
        &outcome,
        req.project_id,
        json!({
            "start_time": req.start_time,
            "end_time": req.end_time,
            "duration": req.end_time - req.start_time,
        }),
    ))
}

fn default_target_format() -> String {
    "mp4".to_string()
}
fn default_quality() -> String {
    "medium".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub filename: String,
    #[serde(default = "default_target_format")]
    pub target_format: String,
    #[serde(default = "default_quality")]
    pub quality: String,
    pub project_id: Option<i64>,
}

pub async fn convert_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ConvertRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::Convert {
        format: req.target_format.parse()?,
        quality: req.quality.parse()?,
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "video converted",
        &req.filename,
        "converted_file",
        &outcome,
        req.project_id,
        json!({"target_format": req.target_format, "quality": req.quality}),
    ))
}

fn default_intensity() -> f64 {
    0.1
}

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub filename: String,
    pub filter_type: String,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
    pub project_id: Option<i64>,
}

pub async fn apply_filter(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<FilterRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::Filter {
        filter: req.filter_type.parse()?,
        intensity: req.intensity,
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "filter applied",
        &req.filename,
        "filtered_file",
        &outcome,
        req.project_id,
        json!({"filter_type": req.filter_type, "intensity": req.intensity}),
    ))
}

fn default_position() -> String {
    "bottom-right".to_string()
}

#[derive(Debug, Deserialize)]
pub struct WatermarkRequest {
    pub filename: String,
    pub text: String,
    #[serde(default = "default_position")]
    pub position: String,
    pub project_id: Option<i64>,
}

pub async fn add_watermark(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<WatermarkRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::Watermark {
        text: req.text.clone(),
        position: req.position.parse()?,
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "watermark added",
        &req.filename,
        "watermarked_file",
        &outcome,
        req.project_id,
        json!({"text": req.text, "position": req.position}),
    ))
}

fn default_output_name() -> String {
    "merged_vlog".to_string()
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub filenames: Vec<String>,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    pub project_id: Option<i64>,
}

pub async fn merge_videos(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<MergeRequest>,
) -> ApiResult<Json<Value>> {
    if req.filenames.len() < 2 {
        return Err(ApiError::malformed("at least two files are required to merge"));
    }

    let first = req.filenames[0].clone();
    let transform = Transform::Merge {
        inputs: req.filenames.clone(),
        output_name: req.output_name.clone(),
    };
    let outcome = run_transform(&state, &user, req.project_id, &first, transform).await?;
    Ok(transform_response(
        "videos merged",
        &first,
        "merged_file",
        &outcome,
        req.project_id,
        json!({"merged_files": req.filenames}),
    ))
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ExtractAudioRequest {
    pub filename: String,
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
    pub project_id: Option<i64>,
}

pub async fn extract_audio(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ExtractAudioRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::ExtractAudio {
        format: req.audio_format.parse()?,
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "audio extracted",
        &req.filename,
        "audio_file",
        &outcome,
        req.project_id,
        json!({"audio_format": req.audio_format}),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceAudioRequest {
    pub video_filename: String,
    pub audio_filename: String,
    pub project_id: Option<i64>,
}

pub async fn replace_audio(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ReplaceAudioRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::ReplaceAudio {
        audio_filename: req.audio_filename.clone(),
    };
    let outcome =
        run_transform(&state, &user, req.project_id, &req.video_filename, transform).await?;
    Ok(transform_response(
        "audio replaced",
        &req.video_filename,
        "output_file",
        &outcome,
        req.project_id,
        json!({"audio_file": req.audio_filename}),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CompressRequest {
    pub filename: String,
    #[serde(default = "default_quality")]
    pub quality: String,
    pub target_size_kb: Option<u64>,
    pub project_id: Option<i64>,
}

pub async fn compress_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CompressRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::Compress {
        quality: req.quality.parse()?,
        target_size_kb: req.target_size_kb,
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "video compressed",
        &req.filename,
        "compressed_file",
        &outcome,
        req.project_id,
        json!({"quality": req.quality, "target_size_kb": req.target_size_kb}),
    ))
}

fn default_subtitle_duration() -> f64 {
    5.0
}
fn default_font_size() -> u32 {
    24
}
fn default_font_color() -> String {
    "white".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SubtitleRequest {
    pub filename: String,
    pub text: String,
    pub start_time: f64,
    #[serde(default = "default_subtitle_duration")]
    pub duration: f64,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    pub project_id: Option<i64>,
}

pub async fn add_subtitle(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<SubtitleRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::Subtitle {
        text: req.text.clone(),
        start: req.start_time,
        duration: req.duration,
        font_size: req.font_size,
        font_color: req.font_color.clone(),
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "subtitle added",
        &req.filename,
        "output_file",
        &outcome,
        req.project_id,
        json!({
            "text": req.text,
            "start_time": req.start_time,
            "duration": req.duration,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct MultipleSubtitlesRequest {
    pub filename: String,
    pub subtitles: Vec<SubtitleEntry>,
    pub project_id: Option<i64>,
}

pub async fn add_multiple_subtitles(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<MultipleSubtitlesRequest>,
) -> ApiResult<Json<Value>> {
    if req.subtitles.is_empty() {
        return Err(ApiError::malformed("subtitle list is empty"));
    }

    let count = req.subtitles.len();
    let transform = Transform::Subtitles {
        entries: req.subtitles,
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "subtitles added",
        &req.filename,
        "output_file",
        &outcome,
        req.project_id,
        json!({"subtitle_count": count}),
    ))
}

fn default_gif_width() -> u32 {
    480
}

#[derive(Debug, Deserialize)]
pub struct ToGifRequest {
    pub filename: String,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "default_subtitle_duration")]
    pub duration: f64,
    #[serde(default = "default_gif_width")]
    pub width: u32,
    pub project_id: Option<i64>,
}

pub async fn video_to_gif(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ToGifRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::ToGif {
        start: req.start_time,
        duration: req.duration,
        width: req.width,
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "GIF generated",
        &req.filename,
        "gif_file",
        &outcome,
        req.project_id,
        json!({
            "start_time": req.start_time,
            "duration": req.duration,
            "width": req.width,
        }),
    ))
}

fn default_thumbnail_width() -> u32 {
    320
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailRequest {
    pub filename: String,
    #[serde(default)]
    pub time_point: f64,
    #[serde(default = "default_thumbnail_width")]
    pub width: u32,
    pub project_id: Option<i64>,
}

pub async fn generate_thumbnail(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<ThumbnailRequest>,
) -> ApiResult<Json<Value>> {
    let transform = Transform::Thumbnail {
        time_point: req.time_point,
        width: req.width,
    };
    let outcome = run_transform(&state, &user, req.project_id, &req.filename, transform).await?;
    Ok(transform_response(
        "thumbnail generated",
        &req.filename,
        "thumbnail_file",
        &outcome,
        req.project_id,
        json!({"time_point": req.time_point, "width": req.width}),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_separators_and_quotes() {
        assert_eq!(sanitize_filename("../../etc/passwd"), ".etcpasswd");
        assert_eq!(sanitize_filename("my video'.mp4"), "my video.mp4");
        assert_eq!(sanitize_filename("clip;rm -rf.mp4"), "cliprm -rf.mp4");
        assert_eq!(sanitize_filename("trip_day-1.mp4"), "trip_day-1.mp4");
    }

    #[test]
    fn sanitized_names_stay_transformable() {
        // Unicode names survive unchanged; dot runs collapse instead of
        // producing a name the planner would refuse.
        assert_eq!(sanitize_filename("视频.mp4"), "视频.mp4");
        assert_eq!(sanitize_filename("my..video.mp4"), "my.video.mp4");

        for name in ["视频.mp4", "my..video.mp4", "日記 2026-08.mp4"] {
            vlogkit_media::ensure_safe_name(&sanitize_filename(name)).unwrap();
        }
    }

    #[test]
    fn transform_response_carries_registration_state() {
        let outcome = TransformOutcome {
            output_filename: "clip_2_5_a.mp4".to_string(),
            output_path: "/up/clip_2_5_a.mp4".into(),
            file_size: 10,
            duration: 3.0,
            asset: None,
        };
        let Json(body) = transform_response(
            "video clipped",
            "a.mp4",
            "clipped_file",
            &outcome,
            None,
            json!({"start_time": 2.0}),
        );
        assert_eq!(body["clipped_file"], "clip_2_5_a.mp4");
        assert_eq!(body["added_to_project"], false);
        assert_eq!(body["video_id"], Value::Null);
        assert_eq!(body["start_time"], 2.0);
    }
}
