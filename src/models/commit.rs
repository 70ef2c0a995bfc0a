//! Commit and person values referenced by blame output.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Id git uses for lines that are not committed yet.
pub const UNCOMMITTED_COMMIT_ID: &str = "0000000000000000000000000000000000000000";

/// Id of the placeholder commit owning the provisional result.
pub const LOADING_COMMIT_ID: &str = "loading";

/// An author or committer. Equality and hashing use (name, email).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// The version of the file this commit's version was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousVersion {
    pub commit_id: String,
    pub file_name: String,
}

/// A commit referenced by the attribution output.
///
/// Everything except the full message is fixed at construction. The message is
/// fetched on demand and can be set once.
#[derive(Debug)]
pub struct Commit {
    pub id: String,
    pub author: Person,
    pub author_date: DateTime<FixedOffset>,
    pub committer: Person,
    pub commit_date: DateTime<FixedOffset>,
    pub summary: String,
    pub previous: Option<PreviousVersion>,
    message: OnceLock<String>,
}

impl Commit {
    pub fn new(
        id: impl Into<String>,
        author: Person,
        author_date: DateTime<FixedOffset>,
        committer: Person,
        commit_date: DateTime<FixedOffset>,
        summary: impl Into<String>,
        previous: Option<PreviousVersion>,
    ) -> Self {
        Self {
            id: id.into(),
            author,
            author_date,
            committer,
            commit_date,
            summary: summary.into(),
            previous,
            message: OnceLock::new(),
        }
    }

    /// Placeholder owner of every line while the real blame is loading.
    pub fn loading() -> Self {
        let epoch = DateTime::<Utc>::UNIX_EPOCH.fixed_offset();
        let nobody = Person::new("Loading", "");
        Self::new(
            LOADING_COMMIT_ID,
            nobody.clone(),
            epoch,
            nobody,
            epoch,
            "Loading blame history...",
            None,
        )
    }

    pub fn short_id(&self) -> &str {
        self.id.get(..16).unwrap_or(&self.id)
    }

    pub fn has_parent(&self) -> bool {
        self.previous.is_some()
    }

    pub fn is_uncommitted(&self) -> bool {
        self.id == UNCOMMITTED_COMMIT_ID
    }

    pub fn is_loading(&self) -> bool {
        self.id == LOADING_COMMIT_ID
    }

    pub fn message(&self) -> Option<&str> {
        self.message.get().map(String::as_str)
    }

    /// Stores the full message unless one was stored already; returns the kept value.
    pub fn set_message(&self, message: String) -> &str {
        self.message.get_or_init(|| message)
    }
}

/// Commit as returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    pub id: String,
    pub short_id: String,
    pub author: Person,
    pub author_date: DateTime<FixedOffset>,
    pub committer: Person,
    pub commit_date: DateTime<FixedOffset>,
    pub summary: String,
    pub previous: Option<PreviousVersion>,
    pub message: Option<String>,
    pub web_url: Option<String>,
}

impl CommitDetail {
    pub fn from_commit(commit: &Commit, web_root: Option<&str>) -> Self {
        Self {
            id: commit.id.clone(),
            short_id: commit.short_id().to_string(),
            author: commit.author.clone(),
            author_date: commit.author_date,
            committer: commit.committer.clone(),
            commit_date: commit.commit_date,
            summary: commit.summary.clone(),
            previous: commit.previous.clone(),
            message: commit.message().map(str::to_string),
            web_url: web_root
                .filter(|_| !commit.is_loading() && !commit.is_uncommitted())
                .map(|root| crate::git::remote::commit_url(root, &commit.id)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitMessage {
    pub id: String,
    pub summary: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn person_equality_uses_name_and_email() {
        let mut counts: HashMap<Person, usize> = HashMap::new();
        for person in [
            Person::new("Ada", "ada@example.com"),
            Person::new("Ada", "ada@example.com"),
            Person::new("Ada", "ada@work.example.com"),
        ] {
            *counts.entry(person).or_default() += 1;
        }

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&Person::new("Ada", "ada@example.com")], 2);
    }

    #[test]
    fn message_is_set_once() {
        let commit = Commit::loading();
        assert_eq!(commit.message(), None);
        assert_eq!(commit.set_message("first".into()), "first");
        assert_eq!(commit.set_message("second".into()), "first");
        assert_eq!(commit.message(), Some("first"));
    }

    #[test]
    fn short_id_truncates_long_ids_only() {
        let mut commit = Commit::loading();
        assert_eq!(commit.short_id(), "loading");
        commit.id = "0123456789abcdef0123456789abcdef01234567".into();
        assert_eq!(commit.short_id(), "0123456789abcdef");
    }
}
