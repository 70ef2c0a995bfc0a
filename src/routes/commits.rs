use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::blame::position;
use super::AppState;
use crate::error::{AppError, Result};
use crate::git::BlameBackend;
use crate::models::CommitMessage;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/commits/{id}/message", get(get_commit_message))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    path: String,
    commit: Option<String>,
}

/// Full message of a commit in an open blame; fetched once, then served from the commit.
async fn get_commit_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<CommitMessage>> {
    let not_found = || AppError::CommitNotFound(id.clone());
    let result = state
        .sessions
        .get(&position(query.path, query.commit))?
        .ok_or_else(not_found)?;
    let commit = result
        .commit(&id)?
        .filter(|c| !c.is_loading())
        .ok_or_else(not_found)?;

    let message = match commit.message() {
        Some(message) => message.to_string(),
        None if commit.is_uncommitted() => commit.set_message(commit.summary.clone()).to_string(),
        None => {
            let backend = Arc::clone(state.sessions.backend());
            let commit_id = commit.id.clone();
            let fetched = tokio::task::spawn_blocking(move || backend.commit_message(&commit_id))
                .await
                .map_err(|e| AppError::Internal(format!("message task failed: {}", e)))??;
            commit.set_message(fetched).to_string()
        }
    };

    Ok(Json(CommitMessage {
        id: commit.id.clone(),
        summary: commit.summary.clone(),
        message,
    }))
}
