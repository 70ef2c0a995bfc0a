//! Repository-related DTOs.
//!
//! - `RepositoryInfo`: repo metadata (header display, web links)
//! - `CommitInfo`: basic commit info for the head commit

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub oid: String,
    pub summary: String,
    pub author: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub path: String,
    pub head_branch: Option<String>,
    pub head_commit: Option<CommitInfo>,
    pub is_bare: bool,
    pub remote_url: Option<String>,
    /// Root of the web viewer for the origin remote, when recognised.
    pub web_root_url: Option<String>,
}
