//! Application error types and HTTP response mapping.
//!
//! `AppError` covers every failure of a blame run:
//! - malformed attribution input (`MalformedAttribution`)
//! - internal consistency violations (`Consistency`), always logged loudly
//! - backend failures (`GitCommand`, `Git`, `Io`, the not-found kinds)
//!
//! Error mappings:
//! - `RepoNotFound`, `PathNotFound`, `CommitNotFound` → 404
//! - `InvalidPath`, `InvalidLine` → 400
//! - `GitCommand`, `MalformedAttribution` → 502
//! - everything else → 500

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git exited with code {code:?}: {stderr}")]
    GitCommand { code: Option<i32>, stderr: String },

    #[error("Malformed attribution output: {0}")]
    MalformedAttribution(String),

    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid line: {0}")]
    InvalidLine(u32),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Builds a consistency violation, logging it at error level first.
    pub fn consistency(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!("blame consistency violation: {}", message);
        AppError::Consistency(message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        AppError::MalformedAttribution(message.into())
    }

    pub fn lock_poisoned() -> Self {
        AppError::Internal("Lock poisoned".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::RepoNotFound(_) | AppError::PathNotFound(_) | AppError::CommitNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::InvalidPath(_) | AppError::InvalidLine(_) => StatusCode::BAD_REQUEST,
            AppError::GitCommand { .. } | AppError::MalformedAttribution(_) => StatusCode::BAD_GATEWAY,
            AppError::Git(_) | AppError::Io(_) | AppError::Consistency(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
