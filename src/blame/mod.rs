//! Blame reconciliation engine.
//!
//! - `parser`: `git blame --incremental` output → blocks + commit table
//! - `diff`: two file versions → lines split into existing/new spans
//! - `assembler`: blocks + diffs → reconciled lines in current numbering
//! - `result`: live, observable blame store
//! - `session`: one live result per blame position
//!
//! `reconcile()` drives a full run in the background.

pub mod assembler;
pub mod diff;
pub mod parser;
pub mod result;
pub mod session;
pub mod text;

use std::sync::Arc;
use std::time::Instant;

use tokio::task::{JoinError, JoinSet};

pub use assembler::{BlameAssembler, CommitGroup};
pub use diff::{DiffOp, DiffReconciler};
pub use parser::{parse_attribution, Attribution};
pub use result::{BlameEvent, BlameResult};
pub use session::BlameSessions;

use crate::error::{AppError, Result};
use crate::git::BlameBackend;
use crate::models::BlamePosition;

/// Runs attribution for `position` and reconciles it into `result`.
///
/// The result keeps its provisional content until the attribution is parsed;
/// commit groups are then resolved concurrently and `result` is marked
/// complete. On error the caller decides how to mark the result.
pub async fn reconcile<B: BlameBackend>(
    backend: Arc<B>,
    position: BlamePosition,
    result: Arc<BlameResult>,
) -> Result<()> {
    let start = Instant::now();

    let (attribution, current_content) = {
        let backend = Arc::clone(&backend);
        let position = position.clone();
        tokio::task::spawn_blocking(move || -> Result<_> {
            let commit_id = position.commit_id.as_deref();
            let output = backend.run_attribution(&position.file_name, commit_id)?;
            let current_content = backend.current_content(&position.file_name, commit_id)?;
            Ok((parse_attribution(&output)?, current_content))
        })
        .await
        .map_err(task_failed)??
    };
    tracing::debug!(
        "Attribution for {}: {} blocks, {} commits in {:?}",
        position.file_name,
        attribution.blocks.len(),
        attribution.commits.len(),
        start.elapsed()
    );

    let assembler = BlameAssembler::new(backend, Arc::clone(&result), &current_content);
    let groups = assembler.publish(attribution)?;

    let mut tasks = JoinSet::new();
    for group in groups {
        let assembler = assembler.clone();
        tasks.spawn_blocking(move || assembler.resolve_group(&group));
    }

    let mut resolved = 0;
    while let Some(joined) = tasks.join_next().await {
        resolved += joined.map_err(task_failed)??;
    }

    result.complete()?;
    let stats = assembler.contents().stats();
    tracing::info!(
        "Blamed {} ({} of {} lines resolved, {} versions read, {} reused) in {:?}",
        position.file_name,
        resolved,
        result.line_count()?,
        stats.misses,
        stats.hits,
        start.elapsed()
    );
    Ok(())
}

fn task_failed(e: JoinError) -> AppError {
    AppError::Internal(format!("blame task failed: {}", e))
}
