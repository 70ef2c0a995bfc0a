//! API route handlers - maps HTTP endpoints to blame sessions.
//!
//! Each submodule defines routes for a feature area:
//! - `repository`: Basic repo info (GET /api/v1/repository)
//! - `blame`: Live blame snapshots and per-line detail
//! - `commits`: Lazily fetched commit messages

pub mod blame;
pub mod commits;
pub mod repository;

use std::sync::Arc;

use axum::Router;

use crate::blame::BlameSessions;
use crate::error::Result;
use crate::git::GitRepository;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<GitRepository>,
    pub sessions: Arc<BlameSessions<GitRepository>>,
    /// Web root of the origin remote, for commit links.
    pub web_root: Option<String>,
}

impl AppState {
    pub fn new(repo: GitRepository) -> Result<Self> {
        let web_root = repo
            .origin_url()?
            .as_deref()
            .and_then(crate::git::remote::web_root_url);
        let repo = Arc::new(repo);
        Ok(Self {
            sessions: Arc::new(BlameSessions::new(Arc::clone(&repo))),
            repo,
            web_root,
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(repository::routes(state.clone()))
        .merge(blame::routes(state.clone()))
        .merge(commits::routes(state))
}
