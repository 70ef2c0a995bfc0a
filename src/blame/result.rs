//! Live blame result for one file at one revision.
//!
//! Created provisional (the whole file as one block owned by a loading
//! placeholder), then updated in place while reconciliation runs in the
//! background:
//! - `replace` swaps in the parsed blocks and commit table (broad update)
//! - `resolve_line` writes one reconciled line (targeted update)
//!
//! Every update bumps `version` and is broadcast as a `BlameEvent`, so the
//! rendering side can either subscribe or poll `snapshot()`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use super::text::split_lines;
use crate::error::{AppError, Result};
use crate::models::{
    BlamePosition, BlameSnapshot, BlameStatus, Block, BlockInfo, Commit, CommitDetail, Line, LineDetail,
    LineInfo, LinePartStatus,
};

const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlameEvent {
    /// Blocks, commits and every line were replaced.
    Replaced { version: u64 },
    LineResolved { line_number: u32, version: u64 },
    Completed { version: u64 },
    Failed { message: String, version: u64 },
}

struct BlameState {
    blocks: Vec<Block>,
    commits: HashMap<String, Arc<Commit>>,
    lines: Vec<Line>,
    /// Literal text of every current line; resolved lines must keep it.
    texts: Vec<String>,
    resolved: Vec<bool>,
    status: BlameStatus,
    error: Option<String>,
    version: u64,
}

impl BlameState {
    fn provisional_lines(texts: &[String]) -> Vec<Line> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let number = index as u32 + 1;
                Line::from_text(number, number, text, LinePartStatus::Existing)
            })
            .collect()
    }

    fn block_index(&self, line_number: u32) -> Option<usize> {
        let index = self.blocks.partition_point(|b| b.end_line() <= line_number);
        self.blocks
            .get(index)
            .filter(|b| b.contains(line_number))
            .map(|_| index)
    }
}

pub struct BlameResult {
    file_name: String,
    state: RwLock<BlameState>,
    events: broadcast::Sender<BlameEvent>,
}

impl BlameResult {
    /// Whole file as a single block owned by the loading placeholder.
    pub fn provisional(file_name: impl Into<String>, content: &str) -> Self {
        let texts = split_lines(content);
        let loading = Arc::new(Commit::loading());
        let file_name = file_name.into();

        let blocks = if texts.is_empty() {
            Vec::new()
        } else {
            vec![Block::new(1, texts.len() as u32, Arc::clone(&loading), file_name.clone(), 1)]
        };
        let commits = HashMap::from([(loading.id.clone(), loading)]);

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            file_name,
            state: RwLock::new(BlameState {
                blocks,
                commits,
                lines: BlameState::provisional_lines(&texts),
                resolved: vec![false; texts.len()],
                texts,
                status: BlameStatus::Loading,
                error: None,
                version: 0,
            }),
            events,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BlameState>> {
        self.state.read().map_err(|_| AppError::lock_poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BlameState>> {
        self.state.write().map_err(|_| AppError::lock_poisoned())
    }

    fn notify(&self, event: BlameEvent) {
        // no receivers is fine; pollers use snapshots
        let _ = self.events.send(event);
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlameEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> Result<BlameStatus> {
        Ok(self.read()?.status)
    }

    pub fn error(&self) -> Result<Option<String>> {
        Ok(self.read()?.error.clone())
    }

    pub fn version(&self) -> Result<u64> {
        Ok(self.read()?.version)
    }

    pub fn line_count(&self) -> Result<u32> {
        Ok(self.read()?.lines.len() as u32)
    }

    pub fn blocks(&self) -> Result<Vec<Block>> {
        Ok(self.read()?.blocks.clone())
    }

    pub fn lines(&self) -> Result<Vec<Line>> {
        Ok(self.read()?.lines.clone())
    }

    pub fn line(&self, line_number: u32) -> Result<Option<Line>> {
        let state = self.read()?;
        Ok(line_index(line_number, state.lines.len()).map(|index| state.lines[index].clone()))
    }

    pub fn is_resolved(&self, line_number: u32) -> Result<bool> {
        let state = self.read()?;
        Ok(line_index(line_number, state.lines.len()).is_some_and(|index| state.resolved[index]))
    }

    pub fn resolved_count(&self) -> Result<u32> {
        Ok(self.read()?.resolved.iter().filter(|r| **r).count() as u32)
    }

    pub fn commit(&self, id: &str) -> Result<Option<Arc<Commit>>> {
        Ok(self.read()?.commits.get(id).cloned())
    }

    pub fn block_for_line(&self, line_number: u32) -> Result<Option<Block>> {
        let state = self.read()?;
        Ok(state.block_index(line_number).map(|index| state.blocks[index].clone()))
    }

    /// Replaces blocks, commits and current text; every line becomes provisional again.
    pub fn replace(
        &self,
        blocks: Vec<Block>,
        commits: HashMap<String, Arc<Commit>>,
        texts: Vec<String>,
    ) -> Result<()> {
        verify_coverage(&blocks, texts.len())?;

        let version = {
            let mut state = self.write()?;
            state.lines = BlameState::provisional_lines(&texts);
            state.resolved = vec![false; texts.len()];
            state.texts = texts;
            state.blocks = blocks;
            state.commits = commits;
            state.version += 1;
            state.version
        };

        self.notify(BlameEvent::Replaced { version });
        Ok(())
    }

    /// Writes a reconciled line into its slot.
    ///
    /// Each slot can be written once per `replace`, and only with parts that
    /// spell the line's current text.
    pub fn resolve_line(&self, line: Line) -> Result<()> {
        let line_number = line.line_number;
        let version = {
            let mut state = self.write()?;
            let Some(index) = line_index(line_number, state.lines.len()) else {
                return Err(AppError::consistency(format!(
                    "line {} is outside {} ({} lines)",
                    line_number,
                    self.file_name,
                    state.lines.len()
                )));
            };
            if state.resolved[index] {
                return Err(AppError::consistency(format!(
                    "line {} of {} was resolved twice",
                    line_number, self.file_name
                )));
            }
            let text = line.text();
            if text != state.texts[index] {
                return Err(AppError::consistency(format!(
                    "line {} of {} changed text from {:?} to {:?}",
                    line_number, self.file_name, state.texts[index], text
                )));
            }

            state.lines[index] = line;
            state.resolved[index] = true;
            state.version += 1;
            state.version
        };

        self.notify(BlameEvent::LineResolved { line_number, version });
        Ok(())
    }

    pub fn complete(&self) -> Result<()> {
        let version = {
            let mut state = self.write()?;
            state.status = BlameStatus::Complete;
            state.version += 1;
            state.version
        };
        self.notify(BlameEvent::Completed { version });
        Ok(())
    }

    /// Marks the run failed; the lines keep whatever they showed so far.
    pub fn fail(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        let version = {
            let mut state = self.write()?;
            state.status = BlameStatus::Failed;
            state.error = Some(message.clone());
            state.version += 1;
            state.version
        };
        self.notify(BlameEvent::Failed { message, version });
        Ok(())
    }

    /// Where to continue blaming a resolved line in its commit's parent version.
    pub fn previous_position(&self, line_number: u32) -> Result<Option<BlamePosition>> {
        let state = self.read()?;
        let Some(index) = line_index(line_number, state.lines.len()) else {
            return Ok(None);
        };
        if !state.resolved[index] {
            return Ok(None);
        }
        let Some(block) = state.block_index(line_number).map(|i| &state.blocks[i]) else {
            return Ok(None);
        };

        Ok(block.commit.previous.as_ref().map(|previous| {
            BlamePosition::new(previous.file_name.clone(), Some(previous.commit_id.clone()))
                .at_line(state.lines[index].old_line_number)
        }))
    }

    pub fn line_detail(&self, line_number: u32, web_root: Option<&str>) -> Result<LineDetail> {
        let previous = self.previous_position(line_number)?;
        let state = self.read()?;
        let index = line_index(line_number, state.lines.len()).ok_or(AppError::InvalidLine(line_number))?;
        let block = state
            .block_index(line_number)
            .map(|i| &state.blocks[i])
            .ok_or_else(|| AppError::consistency(format!("no block covers line {}", line_number)))?;

        Ok(LineDetail {
            line: LineInfo::new(&state.lines[index], state.resolved[index]),
            block: BlockInfo::from(block),
            commit: CommitDetail::from_commit(&block.commit, web_root),
            previous,
        })
    }

    pub fn snapshot(&self, web_root: Option<&str>) -> Result<BlameSnapshot> {
        let state = self.read()?;

        let mut commits: Vec<CommitDetail> = state
            .commits
            .values()
            .map(|commit| CommitDetail::from_commit(commit, web_root))
            .collect();
        commits.sort_by(|a, b| b.author_date.cmp(&a.author_date).then_with(|| a.id.cmp(&b.id)));

        Ok(BlameSnapshot {
            file_name: self.file_name.clone(),
            status: state.status,
            error: state.error.clone(),
            version: state.version,
            line_count: state.lines.len() as u32,
            resolved_count: state.resolved.iter().filter(|r| **r).count() as u32,
            blocks: state.blocks.iter().map(BlockInfo::from).collect(),
            lines: state
                .lines
                .iter()
                .zip(&state.resolved)
                .map(|(line, resolved)| LineInfo::new(line, *resolved))
                .collect(),
            commits,
        })
    }
}

fn line_index(line_number: u32, line_count: usize) -> Option<usize> {
    let index = (line_number as usize).checked_sub(1)?;
    (index < line_count).then_some(index)
}

/// Blocks must tile `1..=line_count` in order, with no gaps or overlaps.
pub fn verify_coverage(blocks: &[Block], line_count: usize) -> Result<()> {
    let mut next_line: u64 = 1;
    for block in blocks {
        if u64::from(block.start_line) != next_line {
            return Err(AppError::consistency(format!(
                "block for {} starts at line {}, expected {}",
                block.commit.id, block.start_line, next_line
            )));
        }
        next_line += u64::from(block.line_count);
    }

    let covered = next_line - 1;
    if covered != line_count as u64 {
        return Err(AppError::consistency(format!(
            "blocks cover {} lines but the file has {}",
            covered, line_count
        )));
    }
    Ok(())
}
