//! Version-control operations the blame engine depends on.
//!
//! `GitRepository` is the production implementation; tests plug in
//! in-memory fakes.

use crate::error::Result;
use crate::models::UNCOMMITTED_COMMIT_ID;

pub trait BlameBackend: Send + Sync + 'static {
    /// Raw `git blame --incremental` output for `file_name` at `commit_id`,
    /// or for the working copy when no commit is given.
    fn run_attribution(&self, file_name: &str, commit_id: Option<&str>) -> Result<String>;

    /// Full text of a file at one commit, BOM stripped.
    fn file_content_at_commit(&self, commit_id: &str, file_name: &str) -> Result<String>;

    /// Full text of a file in the working copy, BOM stripped.
    fn working_copy_content(&self, file_name: &str) -> Result<String>;

    fn remote_url(&self) -> Result<Option<String>>;

    fn commit_message(&self, commit_id: &str) -> Result<String>;

    /// Commit HEAD points at, `None` for an unborn branch or a backend
    /// without a movable HEAD.
    fn head_commit_id(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Content of the file being blamed.
    fn current_content(&self, file_name: &str, commit_id: Option<&str>) -> Result<String> {
        match commit_id {
            Some(commit_id) => self.file_content_at_commit(commit_id, file_name),
            None => self.working_copy_content(file_name),
        }
    }

    /// A commit's own version of a file; the uncommitted pseudo commit's version
    /// is the working copy.
    fn content_for_commit(&self, commit_id: &str, file_name: &str) -> Result<String> {
        if commit_id == UNCOMMITTED_COMMIT_ID {
            self.working_copy_content(file_name)
        } else {
            self.file_content_at_commit(commit_id, file_name)
        }
    }
}
