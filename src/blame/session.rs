//! Live blame results keyed by position.
//!
//! Opening a position returns its existing result, or builds a provisional one
//! and starts reconciliation in the background. A result is reused only while
//! HEAD and the blamed content are unchanged. A failed result, or an explicit
//! refresh, is replaced by a fresh run; the superseded run finishes
//! unobserved. Settled results beyond the capacity are evicted, least recently
//! opened first.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::reconcile;
use super::result::BlameResult;
use crate::error::{AppError, Result};
use crate::git::BlameBackend;
use crate::models::{BlamePosition, BlameStatus};

const MAX_SESSIONS: usize = 64;

/// What a result was built from. A session whose fingerprint no longer
/// matches is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    head: Option<String>,
    content_hash: u64,
}

impl Fingerprint {
    fn new(head: Option<String>, content: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Self {
            head,
            content_hash: hasher.finish(),
        }
    }
}

struct Session {
    result: Arc<BlameResult>,
    fingerprint: Fingerprint,
    last_opened: Instant,
}

pub struct BlameSessions<B> {
    backend: Arc<B>,
    capacity: usize,
    results: Mutex<HashMap<BlamePosition, Session>>,
}

impl<B: BlameBackend> BlameSessions<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_capacity(backend, MAX_SESSIONS)
    }

    fn with_capacity(backend: Arc<B>, capacity: usize) -> Self {
        Self {
            backend,
            capacity: capacity.max(1),
            results: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Sessions ignore the line; a line only selects a row inside a result.
    fn key(position: &BlamePosition) -> BlamePosition {
        BlamePosition::new(position.file_name.clone(), position.commit_id.clone())
    }

    pub fn get(&self, position: &BlamePosition) -> Result<Option<Arc<BlameResult>>> {
        let results = self.results.lock().map_err(|_| AppError::lock_poisoned())?;
        Ok(results.get(&Self::key(position)).map(|s| Arc::clone(&s.result)))
    }

    /// Returns the result for `position`, starting a run when there is none to reuse.
    pub async fn open(&self, position: &BlamePosition, refresh: bool) -> Result<Arc<BlameResult>> {
        let key = Self::key(position);

        let (content, fingerprint) = {
            let backend = Arc::clone(&self.backend);
            let key = key.clone();
            tokio::task::spawn_blocking(move || -> Result<(String, Fingerprint)> {
                let head = backend.head_commit_id()?;
                let content = backend.current_content(&key.file_name, key.commit_id.as_deref())?;
                let fingerprint = Fingerprint::new(head, &content);
                Ok((content, fingerprint))
            })
            .await
            .map_err(|e| AppError::Internal(format!("blame task failed: {}", e)))??
        };

        let result = {
            let mut results = self.results.lock().map_err(|_| AppError::lock_poisoned())?;
            if !refresh {
                if let Some(session) = results.get_mut(&key) {
                    if session.fingerprint == fingerprint && session.result.status()? != BlameStatus::Failed {
                        session.last_opened = Instant::now();
                        return Ok(Arc::clone(&session.result));
                    }
                    if session.fingerprint != fingerprint {
                        tracing::debug!("Blame for {} is stale, rebuilding", key.file_name);
                    }
                }
            }
            let result = Arc::new(BlameResult::provisional(key.file_name.clone(), &content));
            results.insert(
                key.clone(),
                Session {
                    result: Arc::clone(&result),
                    fingerprint,
                    last_opened: Instant::now(),
                },
            );
            evict(&mut results, self.capacity, &key)?;
            result
        };

        tracing::debug!("Starting blame for {} at {:?}", key.file_name, key.commit_id);
        let backend = Arc::clone(&self.backend);
        let run = Arc::clone(&result);
        tokio::spawn(async move {
            if let Err(e) = reconcile(backend, key.clone(), Arc::clone(&run)).await {
                tracing::warn!("Blame for {} failed: {}", key.file_name, e);
                if let Err(e) = run.fail(e.to_string()) {
                    tracing::error!("Could not record blame failure: {}", e);
                }
            }
        });

        Ok(result)
    }
}

/// Drops settled sessions, least recently opened first, until the map fits
/// `capacity`. Running sessions and `keep` are never dropped.
fn evict(results: &mut HashMap<BlamePosition, Session>, capacity: usize, keep: &BlamePosition) -> Result<()> {
    while results.len() > capacity {
        let mut oldest: Option<(&BlamePosition, Instant)> = None;
        for (position, session) in results.iter() {
            if position == keep || session.result.status()? == BlameStatus::Loading {
                continue;
            }
            if oldest.is_none_or(|(_, opened)| session.last_opened < opened) {
                oldest = Some((position, session.last_opened));
            }
        }
        let Some(position) = oldest.map(|(position, _)| position.clone()) else {
            break;
        };
        tracing::debug!("Evicting blame for {} at {:?}", position.file_name, position.commit_id);
        results.remove(&position);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct RootOnlyBackend {
        runs: AtomicUsize,
        fail: bool,
        working_copy: Mutex<String>,
        head: Mutex<Option<String>>,
    }

    impl RootOnlyBackend {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                fail,
                working_copy: Mutex::new("one\ntwo\n".to_string()),
                head: Mutex::new(Some("aaaa".to_string())),
            })
        }

        fn edit(&self, content: &str) {
            *self.working_copy.lock().unwrap() = content.to_string();
        }
    }

    impl BlameBackend for RootOnlyBackend {
        fn run_attribution(&self, _: &str, _: Option<&str>) -> Result<String> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::GitCommand {
                    code: Some(128),
                    stderr: "fatal: not a git repository".to_string(),
                });
            }
            let lines = self.working_copy.lock().unwrap().lines().count();
            Ok(format!(
                "aaaa 1 1 {}\nauthor A\nauthor-mail <a@x.com>\nauthor-time 1000\nauthor-tz +0000\n\
                 committer A\ncommitter-mail <a@x.com>\ncommitter-time 1000\ncommitter-tz +0000\n\
                 summary Initial\nfilename f.txt\n",
                lines
            ))
        }

        fn file_content_at_commit(&self, commit_id: &str, _: &str) -> Result<String> {
            Err(AppError::CommitNotFound(commit_id.to_string()))
        }

        fn working_copy_content(&self, _: &str) -> Result<String> {
            Ok(self.working_copy.lock().unwrap().clone())
        }

        fn remote_url(&self) -> Result<Option<String>> {
            Ok(None)
        }

        fn commit_message(&self, _: &str) -> Result<String> {
            Ok(String::new())
        }

        fn head_commit_id(&self) -> Result<Option<String>> {
            Ok(self.head.lock().unwrap().clone())
        }
    }

    async fn wait_until_settled(result: &BlameResult) -> BlameStatus {
        for _ in 0..200 {
            let status = result.status().unwrap();
            if status != BlameStatus::Loading {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        result.status().unwrap()
    }

    #[tokio::test]
    async fn open_reuses_running_result() {
        let sessions = BlameSessions::new(RootOnlyBackend::new(false));
        let position = BlamePosition::new("f.txt", None);

        let first = sessions.open(&position, false).await.unwrap();
        let second = sessions.open(&position.clone().at_line(2), false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(wait_until_settled(&first).await, BlameStatus::Complete);
        assert_eq!(first.resolved_count().unwrap(), 2);
        assert_eq!(sessions.backend().runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_starts_a_new_run() {
        let sessions = BlameSessions::new(RootOnlyBackend::new(false));
        let position = BlamePosition::new("f.txt", None);

        let first = sessions.open(&position, false).await.unwrap();
        wait_until_settled(&first).await;
        let second = sessions.open(&position, true).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &sessions.get(&position).unwrap().unwrap()));
    }

    #[tokio::test]
    async fn failed_run_is_recorded_and_replaced() {
        let sessions = BlameSessions::new(RootOnlyBackend::new(true));
        let position = BlamePosition::new("f.txt", None);

        let first = sessions.open(&position, false).await.unwrap();
        assert_eq!(wait_until_settled(&first).await, BlameStatus::Failed);
        assert!(first.error().unwrap().unwrap().contains("not a git repository"));
        assert_eq!(first.line(1).unwrap().unwrap().text(), "one");

        let second = sessions.open(&position, false).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn edited_working_copy_is_blamed_again() {
        let sessions = BlameSessions::new(RootOnlyBackend::new(false));
        let position = BlamePosition::new("f.txt", None);
        let first = sessions.open(&position, false).await.unwrap();
        assert_eq!(wait_until_settled(&first).await, BlameStatus::Complete);

        sessions.backend().edit("one\ntwo\nthree\n");
        let second = sessions.open(&position.clone().at_line(3), false).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.line_count().unwrap(), 3);
        assert_eq!(second.line(3).unwrap().unwrap().text(), "three");
        assert_eq!(wait_until_settled(&second).await, BlameStatus::Complete);
        assert_eq!(sessions.backend().runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn moved_head_invalidates_result() {
        let sessions = BlameSessions::new(RootOnlyBackend::new(false));
        let position = BlamePosition::new("f.txt", None);
        let first = sessions.open(&position, false).await.unwrap();
        wait_until_settled(&first).await;

        *sessions.backend().head.lock().unwrap() = Some("bbbb".to_string());
        let second = sessions.open(&position, false).await.unwrap();
        let third = sessions.open(&position, false).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[tokio::test]
    async fn settled_sessions_are_evicted_oldest_first() {
        let sessions = BlameSessions::with_capacity(RootOnlyBackend::new(false), 2);
        let positions: Vec<BlamePosition> = ["a.txt", "b.txt", "c.txt"]
            .into_iter()
            .map(|file| BlamePosition::new(file, None))
            .collect();

        for position in &positions[..2] {
            let result = sessions.open(position, false).await.unwrap();
            wait_until_settled(&result).await;
        }
        // Reopening a.txt makes b.txt the least recently used.
        sessions.open(&positions[0], false).await.unwrap();
        sessions.open(&positions[2], false).await.unwrap();

        assert!(sessions.get(&positions[0]).unwrap().is_some());
        assert!(sessions.get(&positions[1]).unwrap().is_none());
        assert!(sessions.get(&positions[2]).unwrap().is_some());
    }
}
