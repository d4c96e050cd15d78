use std::path::PathBuf;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<&'static str>,
}

impl ApiError {
    pub fn missing_parameter(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: Some("MISSING_PARAMETER"),
        }
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: Some("INVALID_URL"),
        }
    }

    pub fn download_failed() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Failed to download video".to_string(),
            code: Some("DOWNLOAD_ERROR"),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
            code: Some("NOT_FOUND"),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            code: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            code: self.code,
        });

        (self.status, body).into_response()
    }
}

/// Failure reported by a [`crate::extractor::MediaExtractor`].
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("extractor binary {0:?} is not installed")]
    NotInstalled(PathBuf),
    #[error("could not run extractor: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("extractor exited with {status}: {message}")]
    Failed { status: String, message: String },
    #[error("extractor returned unreadable metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("url does not belong to a supported platform")]
    UnsupportedPlatform,
    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("extractor reported success but {0:?} does not exist")]
    MissingOutput(PathBuf),
}

impl From<DownloadError> for ApiError {
    fn from(error: DownloadError) -> Self {
        match error {
            DownloadError::UnsupportedPlatform => ApiError::invalid_url(
                "Unsupported URL. Only YouTube, Facebook and Instagram links are supported.",
            ),
            other => {
                warn!("download failed: {other}");
                ApiError::download_failed()
            }
        }
    }
}
