//! Per-run cache of historical file content.
//!
//! Several commit groups usually share a parent version, so each
//! (commit, file) pair is fetched from the backend at most once per run:
//! - entries are created under a short map lock
//! - the fetch itself runs inside the entry's `OnceLock`, so concurrent
//!   requests for the same version wait for one fetch instead of repeating it
//! - failures are cached too; the caller leaves the affected lines provisional
//!
//! Used by: `BlameAssembler::resolve_group()`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use super::BlameBackend;

type Slot = Arc<OnceLock<Option<Arc<str>>>>;

pub struct ContentCache<B> {
    backend: Arc<B>,
    entries: Mutex<HashMap<(String, String), Slot>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<B: BlameBackend> ContentCache<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Content of `file_name` as of `commit_id`, or `None` if it could not be fetched.
    pub fn get(&self, commit_id: &str, file_name: &str) -> Option<Arc<str>> {
        let slot = {
            let mut entries = match self.entries.lock() {
                Ok(entries) => entries,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(
                entries
                    .entry((commit_id.to_string(), file_name.to_string()))
                    .or_default(),
            )
        };

        if let Some(content) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return content.clone();
        }

        slot.get_or_init(|| {
            self.misses.fetch_add(1, Ordering::Relaxed);
            let start = Instant::now();
            match self.backend.content_for_commit(commit_id, file_name) {
                Ok(content) => {
                    tracing::debug!(
                        "Fetched {} at {} ({} bytes) in {:?}",
                        file_name,
                        commit_id,
                        content.len(),
                        start.elapsed()
                    );
                    Some(Arc::from(content))
                }
                Err(e) => {
                    tracing::warn!("Could not read {} at {}: {}", file_name, commit_id, e);
                    None
                }
            }
        })
        .clone()
    }

    /// Cache statistics for debugging
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().map(|e| e.len()).unwrap_or(0),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}
