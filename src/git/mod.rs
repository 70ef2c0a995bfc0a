pub mod attribution;
pub mod backend;
pub mod cache;
pub mod content;
pub mod remote;
pub mod repository;

pub use backend::BlameBackend;
pub use cache::ContentCache;
pub use repository::GitRepository;
