//! File content and commit messages read through libgit2.

use std::path::{Component, Path, PathBuf};

use git2::{ErrorCode, Repository};

use super::GitRepository;
use crate::blame::text::normalize_content;
use crate::error::{AppError, Result};

impl GitRepository {
    /// Text of `file_name` as of `commit_id`.
    pub fn file_at_commit(&self, commit_id: &str, file_name: &str) -> Result<String> {
        let relative = validate_path(file_name)?;
        self.with_repo(|repo| {
            let commit = find_commit(repo, commit_id)?;
            let tree = commit.tree()?;
            let entry = tree
                .get_path(&relative)
                .map_err(|_| AppError::PathNotFound(format!("{} at {}", file_name, commit_id)))?;
            let object = entry.to_object(repo)?;
            let blob = object
                .as_blob()
                .ok_or_else(|| AppError::InvalidPath(format!("{} is not a file", file_name)))?;

            Ok(normalize_content(&String::from_utf8_lossy(blob.content())))
        })
    }

    /// Text of `file_name` in the working directory.
    pub fn working_copy_file(&self, file_name: &str) -> Result<String> {
        let relative = validate_path(file_name)?;
        let bytes = std::fs::read(self.root.join(&relative)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::PathNotFound(file_name.to_string()),
            _ => AppError::Io(e),
        })?;
        Ok(normalize_content(&String::from_utf8_lossy(&bytes)))
    }

    pub fn message_of(&self, commit_id: &str) -> Result<String> {
        self.with_repo(|repo| {
            let commit = find_commit(repo, commit_id)?;
            Ok(commit.message().unwrap_or("").trim_end().to_string())
        })
    }
}

fn find_commit<'r>(repo: &'r Repository, commit_id: &str) -> Result<git2::Commit<'r>> {
    let not_found = || AppError::CommitNotFound(commit_id.to_string());
    if commit_id.starts_with('-') {
        return Err(not_found());
    }
    match repo.revparse_single(commit_id) {
        Ok(object) => object.peel_to_commit().map_err(|_| not_found()),
        Err(e) if e.code() == ErrorCode::NotFound || e.code() == ErrorCode::Ambiguous => Err(not_found()),
        Err(e) if e.class() == git2::ErrorClass::Invalid => Err(not_found()),
        Err(e) => Err(e.into()),
    }
}

/// Accepts repository-relative paths that stay inside the repository.
pub fn validate_path(file_name: &str) -> Result<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(file_name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return Err(AppError::InvalidPath(file_name.to_string())),
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(AppError::InvalidPath(file_name.to_string()));
    }
    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;

    fn commit_file(repo: &Repository, name: &str, content: &[u8], message: &str) -> git2::Oid {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), content).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::now("Ada", "ada@example.com").unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parents: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn reads_versions_and_working_copy() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let first = commit_file(&repo, "f.txt", b"\xef\xbb\xbfone\r\ntwo\r\n", "First\n\nBody text\n");
        std::fs::write(dir.path().join("f.txt"), "one\nthree\n").unwrap();

        let git = GitRepository::open(dir.path()).unwrap();

        assert_eq!(git.file_at_commit(&first.to_string(), "f.txt").unwrap(), "one\ntwo\n");
        assert_eq!(git.file_at_commit("HEAD", "f.txt").unwrap(), "one\ntwo\n");
        assert_eq!(git.working_copy_file("f.txt").unwrap(), "one\nthree\n");
        assert_eq!(git.message_of(&first.to_string()).unwrap(), "First\n\nBody text");
    }

    #[test]
    fn missing_things_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "f.txt", b"x\n", "First");
        let git = GitRepository::open(dir.path()).unwrap();

        assert!(matches!(git.file_at_commit("HEAD", "nope.txt"), Err(AppError::PathNotFound(_))));
        assert!(matches!(
            git.file_at_commit("0123456789abcdef0123456789abcdef01234567", "f.txt"),
            Err(AppError::CommitNotFound(_))
        ));
        assert!(matches!(git.file_at_commit("--help", "f.txt"), Err(AppError::CommitNotFound(_))));
        assert!(matches!(git.working_copy_file("nope.txt"), Err(AppError::PathNotFound(_))));
    }

    #[test]
    fn paths_must_stay_inside_repository() {
        assert!(validate_path("src/lib.rs").is_ok());
        assert_eq!(validate_path("./README.md").unwrap(), PathBuf::from("README.md"));
        for path in ["", "../secret", "/etc/passwd", "a/../../b"] {
            assert!(matches!(validate_path(path), Err(AppError::InvalidPath(_))), "{}", path);
        }
    }
}
