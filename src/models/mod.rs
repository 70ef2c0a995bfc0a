//! Domain values and data transfer objects (DTOs) for API responses.
//!
//! - `commit`: Person, Commit, PreviousVersion, CommitDetail, CommitMessage
//! - `blame`: Block, Line, LinePart, BlamePosition, BlameSnapshot, LineDetail
//! - `repository`: RepositoryInfo, CommitInfo

pub mod blame;
pub mod commit;
pub mod repository;

pub use blame::*;
pub use commit::*;
pub use repository::*;
