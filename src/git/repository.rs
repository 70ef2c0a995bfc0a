use git2::Repository;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::remote::web_root_url;
use super::BlameBackend;
use crate::error::{AppError, Result};
use crate::models::{CommitInfo, RepositoryInfo};

pub struct GitRepository {
    pub repo: Mutex<Repository>,
    pub path: String,
    /// Working directory, or the git directory of a bare repository.
    pub root: PathBuf,
}

impl GitRepository {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let repo = Repository::discover(&path).map_err(|_| AppError::RepoNotFound(path_str.clone()))?;
        let root = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self {
            repo: Mutex::new(repo),
            path: path_str,
            root,
        })
    }

    pub fn info(&self) -> Result<RepositoryInfo> {
        let remote_url = self.origin_url()?;
        let repo = self.repo.lock().map_err(|_| AppError::lock_poisoned())?;

        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let head_branch = repo.head().ok().and_then(|h| {
            if h.is_branch() {
                h.shorthand().map(|s| s.to_string())
            } else {
                None
            }
        });

        let head_commit = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok().map(|c| commit_to_info(&c)));

        Ok(RepositoryInfo {
            name,
            path: self.root.to_string_lossy().to_string(),
            head_branch,
            head_commit,
            is_bare: repo.is_bare(),
            web_root_url: remote_url.as_deref().and_then(web_root_url),
            remote_url,
        })
    }

    pub fn with_repo<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let repo = self.repo.lock().map_err(|_| AppError::lock_poisoned())?;
        f(&repo)
    }

    /// URL of the `origin` remote, if configured.
    pub fn origin_url(&self) -> Result<Option<String>> {
        self.with_repo(|repo| match repo.find_remote("origin") {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
    }
}

impl BlameBackend for GitRepository {
    fn run_attribution(&self, file_name: &str, commit_id: Option<&str>) -> Result<String> {
        self.blame_incremental(file_name, commit_id)
    }

    fn file_content_at_commit(&self, commit_id: &str, file_name: &str) -> Result<String> {
        self.file_at_commit(commit_id, file_name)
    }

    fn working_copy_content(&self, file_name: &str) -> Result<String> {
        self.working_copy_file(file_name)
    }

    fn remote_url(&self) -> Result<Option<String>> {
        self.origin_url()
    }

    fn commit_message(&self, commit_id: &str) -> Result<String> {
        self.message_of(commit_id)
    }

    fn head_commit_id(&self) -> Result<Option<String>> {
        self.with_repo(|repo| Ok(repo.head().ok().and_then(|h| h.target()).map(|oid| oid.to_string())))
    }
}

pub fn commit_to_info(commit: &git2::Commit) -> CommitInfo {
    CommitInfo {
        oid: commit.id().to_string(),
        summary: commit.summary().unwrap_or("").trim().to_string(),
        author: commit.author().name().unwrap_or("Unknown").to_string(),
        timestamp: commit.time().seconds(),
    }
}
