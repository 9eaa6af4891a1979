//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use crate::handlers::auth::{get_user, login, me, register};
use crate::handlers::projects::{
    add_video, batch_process, create_project, get_project, list_project_videos,
    list_user_projects,
};
use crate::handlers::system::{health, root, system_status};
use crate::handlers::videos::{
    add_multiple_subtitles, add_subtitle, add_watermark, apply_filter, clip_video,
    compress_video, convert_video, extract_audio, generate_thumbnail, merge_videos,
    replace_audio, upload_video, video_info, video_to_gif,
};
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me));

    let user_routes = Router::new()
        .route("/users/:user_id", get(get_user))
        .route("/users/:user_id/projects", get(list_user_projects));

    let project_routes = Router::new()
        .route("/projects/create", post(create_project))
        .route("/projects/:project_id", get(get_project))
        .route("/projects/:project_id/add-video", post(add_video))
        .route("/projects/:project_id/videos", get(list_project_videos))
        .route("/projects/:project_id/batch-process", post(batch_process));

    let video_routes = Router::new()
        .route("/upload/video", post(upload_video))
        .route("/video/info", get(video_info))
        .route("/video/clip", post(clip_video))
        .route("/video/convert", post(convert_video))
        .route("/video/filter", post(apply_filter))
        .route("/video/watermark", post(add_watermark))
        .route("/video/merge", post(merge_videos))
        .route("/video/extract-audio", post(extract_audio))
        .route("/video/replace-audio", post(replace_audio))
        .route("/video/compress", post(compress_video))
        .route("/video/add-subtitle", post(add_subtitle))
        .route("/video/add-multiple-subtitles", post(add_multiple_subtitles))
        .route("/video/to-gif", post(video_to_gif))
        .route("/video/thumbnail", post(generate_thumbnail));

    let system_routes = Router::new()
        .route("/health", get(health))
        .route("/system/status", get(system_status));

    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(user_routes)
        .merge(project_routes)
        .merge(video_routes)
        .merge(system_routes);

    Router::new()
        .route("/", get(root))
        .nest("/api", api_routes)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
