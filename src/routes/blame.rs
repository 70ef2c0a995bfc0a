//! Blame endpoints.
//!
//! GET /api/v1/blame?path=<path>&commit=<optional>&refresh=<optional>
//! GET /api/v1/blame/line?path=<path>&commit=<optional>&line=<n>
//!
//! The first request for a position returns the provisional snapshot (one
//! block, status `loading`) and starts reconciliation; clients poll until
//! `status` is `complete` or `failed`, skipping responses whose `version`
//! did not change.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::AppState;
use crate::error::Result;
use crate::models::{BlamePosition, BlameSnapshot, LineDetail};

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/blame", get(get_blame))
        .route("/api/v1/blame/line", get(get_blame_line))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct BlameQuery {
    path: String,
    commit: Option<String>,
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Deserialize)]
struct LineQuery {
    path: String,
    commit: Option<String>,
    line: u32,
}

pub fn position(path: String, commit: Option<String>) -> BlamePosition {
    BlamePosition::new(path, commit.filter(|c| !c.is_empty()))
}

async fn get_blame(
    State(state): State<AppState>,
    Query(query): Query<BlameQuery>,
) -> Result<Json<BlameSnapshot>> {
    let position = position(query.path, query.commit);
    let result = state.sessions.open(&position, query.refresh).await?;
    Ok(Json(result.snapshot(state.web_root.as_deref())?))
}

async fn get_blame_line(
    State(state): State<AppState>,
    Query(query): Query<LineQuery>,
) -> Result<Json<LineDetail>> {
    let position = position(query.path, query.commit).at_line(query.line);
    let result = state.sessions.open(&position, false).await?;
    Ok(Json(result.line_detail(query.line, state.web_root.as_deref())?))
}
