//! Liveness and diagnostics handlers.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "vlogkit server running",
        "status": "running",
        "platform": std::env::consts::OS,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "service": "vlogkit"}))
}

/// Aggregate repository counters plus an upload-directory scan.
pub async fn system_status(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = state.store.system_stats().await?;

    let mut total_files: usize = 0;
    let mut video_files: usize = 0;
    let mut processed_files: usize = 0;
    let mut total_size: u64 = 0;

    let video_exts = ["mp4", "mov", "avi", "webm"];
    let derived_prefixes = ["clip_", "filtered_", "converted_", "watermarked_"];

    if let Ok(mut entries) = tokio::fs::read_dir(&state.config.upload_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            total_files += 1;
            total_size += metadata.len();

            let name = entry.file_name().to_string_lossy().to_string();
            let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
            if video_exts.contains(&ext.as_str()) {
                video_files += 1;
            }
            if derived_prefixes.iter().any(|p| name.starts_with(p)) {
                processed_files += 1;
            }
        }
    }

    let mb = |bytes: u64| (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

    Ok(Json(json!({
        "system": "vlogkit server",
        "status": "running",
        "users_count": stats.users_count,
        "projects_count": stats.projects_count,
        "videos_count": stats.videos_count,
        "storage": {
            "total_files": total_files,
            "video_files": video_files,
            "processed_files": processed_files,
            "total_size_mb": mb(total_size),
            "tracked_size_mb": mb(stats.total_bytes.max(0) as u64),
        },
        "features_available": [
            "upload", "inspect", "clip", "convert", "filter",
            "watermark", "merge", "extract-audio", "replace-audio", "compress",
            "subtitles", "gif-export", "thumbnail", "projects", "batch-processing",
        ],
    })))
}
