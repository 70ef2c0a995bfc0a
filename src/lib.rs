//! Blame viewer: reconciles `git blame` attribution with per-commit diffs so
//! every line of a file is split into the spans its owning commit introduced
//! and the spans it carried over.

pub mod blame;
pub mod error;
pub mod git;
pub mod models;
pub mod routes;
