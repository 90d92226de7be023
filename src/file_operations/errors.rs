use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error taxonomy for the whole service. Validation and permission failures
/// are raised before any store call; `Upstream` wraps store failures with
/// step context attached via `anyhow::Context`.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    AccessDenied,
    NotFound(String),
    Conflict(String),
    Upstream(anyhow::Error),
}

impl AppError {
    fn classification(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::AccessDenied => "permission_denied",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Upstream(_) => "upstream_failure",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(detail) => write!(f, "validation error: {detail}"),
            AppError::AccessDenied => write!(f, "access denied"),
            AppError::NotFound(what) => write!(f, "not found: {what}"),
            AppError::Conflict(detail) => write!(f, "conflict: {detail}"),
            AppError::Upstream(e) => write!(f, "upstream failure: {e:#}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Upstream(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        let body = Json(json!({
            "error": self.classification(),
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}
