//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vlogkit_media::MediaError;
use vlogkit_models::OptionError;
use vlogkit_store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{field} already exists")]
    DuplicateIdentity { field: &'static str },

    #[error("{0}")]
    UnsupportedOption(String),

    #[error("Bad request: {0}")]
    MalformedInput(String),

    /// Carries the external tool's diagnostic text verbatim.
    #[error("Transform failed: {0}")]
    TransformFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateIdentity { .. }
            | ApiError::UnsupportedOption(_)
            | ApiError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            ApiError::TransformFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The text surfaced to the client (and recorded in batch results).
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field } => ApiError::DuplicateIdentity { field },
            StoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::FileNotFound(path) => {
                ApiError::NotFound(format!("video file not found: {}", path.display()))
            }
            MediaError::InvalidRange { .. } | MediaError::UnsafeFilename(_) => {
                ApiError::MalformedInput(err.to_string())
            }
            MediaError::FfmpegFailed { .. }
            | MediaError::FfprobeFailed { .. }
            | MediaError::Timeout(_) => ApiError::TransformFailed(err.diagnostic()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<OptionError> for ApiError {
    fn from(err: OptionError) -> Self {
        ApiError::UnsupportedOption(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.detail()
                }
            }
            _ => self.detail(),
        };

        let body = ErrorResponse { detail };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_duplicate_maps_to_bad_request() {
        let err = ApiError::from(StoreError::Duplicate { field: "email" });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "email already exists");
    }

    #[test]
    fn ffmpeg_failure_surfaces_stderr_verbatim() {
        let media = MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("moov atom not found".to_string()),
            Some(1),
        );
        let err = ApiError::from(media);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "Transform failed: moov atom not found");
    }

    #[test]
    fn option_error_maps_to_unsupported_option() {
        let err = ApiError::from("mkv".parse::<vlogkit_models::VideoFormat>().unwrap_err());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "unsupported target format: mkv");
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = ApiError::from(MediaError::FileNotFound("a.mp4".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
