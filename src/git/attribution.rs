//! Line attribution through the `git` command line.
//!
//! libgit2's blame does not report the `previous` commit of a line, which the
//! reconciler needs, so this shells out to `git blame --incremental`.

use std::process::Command;
use std::time::Instant;

use super::content::validate_path;
use super::GitRepository;
use crate::error::{AppError, Result};

impl GitRepository {
    /// Raw incremental blame of `file_name` at `commit_id` (the working copy if `None`).
    pub fn blame_incremental(&self, file_name: &str, commit_id: Option<&str>) -> Result<String> {
        let relative = validate_path(file_name)?;
        if let Some(commit_id) = commit_id {
            if commit_id.is_empty() || commit_id.starts_with('-') {
                return Err(AppError::CommitNotFound(commit_id.to_string()));
            }
        }

        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(&self.root)
            .args(["blame", "--incremental"]);
        if let Some(commit_id) = commit_id {
            command.arg(commit_id);
        }
        command.arg("--").arg(&relative);

        let start = Instant::now();
        let output = command.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!("git blame {} failed: {}", file_name, stderr);
            return Err(AppError::GitCommand {
                code: output.status.code(),
                stderr,
            });
        }

        tracing::debug!(
            "git blame {} produced {} bytes in {:?}",
            file_name,
            output.stdout.len(),
            start.elapsed()
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
