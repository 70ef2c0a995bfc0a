//! Turns parsed attribution into reconciled lines.
//!
//! Blocks are grouped by commit. For a commit with a parent, the parent's and
//! the commit's own version of the file are diffed once, and the resulting
//! lines (numbered in the commit's own version) are mapped onto the blocks'
//! current line numbers. Root commits need no diff: every line they own is new.

use std::sync::Arc;

use super::diff::DiffReconciler;
use super::parser::Attribution;
use super::result::BlameResult;
use super::text::split_lines;
use crate::error::{AppError, Result};
use crate::git::{BlameBackend, ContentCache};
use crate::models::{Block, Commit, Line, LinePartStatus};

/// Blocks owned by one commit, in original (commit-version) line order.
#[derive(Debug, Clone)]
pub struct CommitGroup {
    pub commit: Arc<Commit>,
    pub blocks: Vec<Block>,
}

impl CommitGroup {
    pub fn line_count(&self) -> u32 {
        self.blocks.iter().map(|b| b.line_count).sum()
    }
}

/// Groups blocks by commit, ordered by each commit's first block.
pub fn group_by_commit(blocks: &[Block]) -> Vec<CommitGroup> {
    let mut groups: Vec<CommitGroup> = Vec::new();
    for block in blocks {
        match groups.iter_mut().find(|g| g.commit.id == block.commit.id) {
            Some(group) => group.blocks.push(block.clone()),
            None => groups.push(CommitGroup {
                commit: Arc::clone(&block.commit),
                blocks: vec![block.clone()],
            }),
        }
    }
    for group in &mut groups {
        group.blocks.sort_by_key(|b| b.original_start_line);
    }
    groups
}

pub fn validate_line_count(blocks: &[Block], line_count: usize) -> Result<()> {
    let attributed: u64 = blocks.iter().map(|b| u64::from(b.line_count)).sum();
    if attributed != line_count as u64 {
        return Err(AppError::consistency(format!(
            "attribution covers {} lines but the file has {}",
            attributed, line_count
        )));
    }
    Ok(())
}

pub struct BlameAssembler<B> {
    contents: Arc<ContentCache<B>>,
    result: Arc<BlameResult>,
    current_lines: Arc<Vec<String>>,
}

impl<B> Clone for BlameAssembler<B> {
    fn clone(&self) -> Self {
        Self {
            contents: Arc::clone(&self.contents),
            result: Arc::clone(&self.result),
            current_lines: Arc::clone(&self.current_lines),
        }
    }
}

impl<B: BlameBackend> BlameAssembler<B> {
    pub fn new(backend: Arc<B>, result: Arc<BlameResult>, current_content: &str) -> Self {
        Self {
            contents: Arc::new(ContentCache::new(backend)),
            result,
            current_lines: Arc::new(split_lines(current_content)),
        }
    }

    pub fn contents(&self) -> &ContentCache<B> {
        &self.contents
    }

    /// Validates the attribution and swaps it into the result.
    ///
    /// Returns the commit groups still to be resolved.
    pub fn publish(&self, attribution: Attribution) -> Result<Vec<CommitGroup>> {
        validate_line_count(&attribution.blocks, self.current_lines.len())?;
        let groups = group_by_commit(&attribution.blocks);

        self.result.replace(
            attribution.blocks,
            attribution.commits,
            self.current_lines.as_ref().clone(),
        )?;
        tracing::debug!(
            "Published {} lines in {} commit groups for {}",
            self.current_lines.len(),
            groups.len(),
            self.result.file_name()
        );
        Ok(groups)
    }

    /// Resolves every line of one group; returns the number of lines written.
    ///
    /// Missing historical content leaves the group's lines provisional.
    pub fn resolve_group(&self, group: &CommitGroup) -> Result<u32> {
        if !group.commit.has_parent() {
            return self.resolve_root(group);
        }
        let (Some(previous), Some(first)) = (group.commit.previous.as_ref(), group.blocks.first()) else {
            return Ok(0);
        };

        let parent_content = self.contents.get(&previous.commit_id, &previous.file_name);
        let own_content = self.contents.get(&group.commit.id, &first.file_name);
        let (Some(parent_content), Some(own_content)) = (parent_content, own_content) else {
            tracing::warn!(
                "Leaving {} lines of {} provisional: history unavailable",
                group.line_count(),
                group.commit.short_id()
            );
            return Ok(0);
        };

        let reconciler = DiffReconciler::new(&parent_content, &own_content);
        let mut lines = reconciler.lines().peekable();
        let mut written = 0;

        for block in &group.blocks {
            while lines
                .next_if(|line| line.line_number < block.original_start_line)
                .is_some()
            {}

            for expected in block.original_start_line..block.original_start_line + block.line_count {
                let line = match lines.next() {
                    Some(line) if line.line_number == expected => line,
                    Some(line) => {
                        return Err(AppError::consistency(format!(
                            "commit {} expected its line {}, diff produced line {}",
                            group.commit.short_id(),
                            expected,
                            line.line_number
                        )));
                    }
                    None => {
                        return Err(AppError::consistency(format!(
                            "commit {} has no line {} in {}",
                            group.commit.short_id(),
                            expected,
                            block.file_name
                        )));
                    }
                };

                let line_number = line.line_number - block.original_start_line + block.start_line;
                self.result.resolve_line(Line { line_number, ..line })?;
                written += 1;
            }
        }

        Ok(written)
    }

    fn resolve_root(&self, group: &CommitGroup) -> Result<u32> {
        let mut written = 0;
        for block in &group.blocks {
            for offset in 0..block.line_count {
                let line_number = block.start_line + offset;
                let text = self
                    .current_lines
                    .get(line_number as usize - 1)
                    .ok_or_else(|| AppError::consistency(format!("line {} is past the end of the file", line_number)))?;

                self.result.resolve_line(Line::from_text(
                    line_number,
                    block.original_start_line + offset,
                    text,
                    LinePartStatus::New,
                ))?;
                written += 1;
            }
        }
        Ok(written)
    }
}
