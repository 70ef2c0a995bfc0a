//! Blame values and data transfer objects.
//!
//! - `Block`: contiguous run of current lines attributed to one commit
//! - `Line`, `LinePart`: one current line split into existing/new spans
//! - `BlamePosition`: file + revision (+ line) a blame view is opened at
//! - `BlameSnapshot`, `LineDetail`: polling responses for the rendering layer

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Commit, CommitDetail};

/// A contiguous run of lines in the current numbering, attributed to one commit.
#[derive(Debug, Clone)]
pub struct Block {
    /// First line in the current file (1-based).
    pub start_line: u32,
    pub line_count: u32,
    pub commit: Arc<Commit>,
    /// File name as of `commit`; differs from the current name after renames.
    pub file_name: String,
    /// First line of this span in the commit's own version of the file.
    pub original_start_line: u32,
}

impl Block {
    pub fn new(
        start_line: u32,
        line_count: u32,
        commit: Arc<Commit>,
        file_name: impl Into<String>,
        original_start_line: u32,
    ) -> Self {
        Self {
            start_line,
            line_count,
            commit,
            file_name: file_name.into(),
            original_start_line,
        }
    }

    /// One past the last line of the block.
    pub fn end_line(&self) -> u32 {
        self.start_line + self.line_count
    }

    pub fn contains(&self, line_number: u32) -> bool {
        (self.start_line..self.end_line()).contains(&line_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinePartStatus {
    /// Carried over unchanged from the line's previous version.
    Existing,
    /// Introduced by the commit the line is attributed to.
    New,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePart {
    pub text: String,
    pub status: LinePartStatus,
}

impl LinePart {
    pub fn new(text: impl Into<String>, status: LinePartStatus) -> Self {
        Self {
            text: text.into(),
            status,
        }
    }
}

/// One line of the current file, decomposed into spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub line_number: u32,
    pub old_line_number: u32,
    pub parts: Vec<LinePart>,
}

impl Line {
    pub fn new(line_number: u32, old_line_number: u32, parts: Vec<LinePart>) -> Self {
        Self {
            line_number,
            old_line_number,
            parts,
        }
    }

    /// A line made of a single span; empty text gives a line with no parts.
    pub fn from_text(line_number: u32, old_line_number: u32, text: &str, status: LinePartStatus) -> Self {
        let parts = if text.is_empty() {
            Vec::new()
        } else {
            vec![LinePart::new(text, status)]
        };
        Self::new(line_number, old_line_number, parts)
    }

    pub fn is_new(&self) -> bool {
        self.parts.iter().all(|part| part.status == LinePartStatus::New)
    }

    pub fn text(&self) -> String {
        self.parts.iter().map(|part| part.text.as_str()).collect()
    }

    /// Appends text, extending the last part when it has the same status.
    pub fn push_part(&mut self, text: &str, status: LinePartStatus) {
        if text.is_empty() {
            return;
        }
        match self.parts.last_mut() {
            Some(last) if last.status == status => last.text.push_str(text),
            _ => self.parts.push(LinePart::new(text, status)),
        }
    }
}

/// Where a blame view is opened: a file, optionally at a revision and line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlamePosition {
    pub file_name: String,
    pub commit_id: Option<String>,
    pub line_number: Option<u32>,
}

impl BlamePosition {
    pub fn new(file_name: impl Into<String>, commit_id: Option<String>) -> Self {
        Self {
            file_name: file_name.into(),
            commit_id,
            line_number: None,
        }
    }

    pub fn at_line(mut self, line_number: u32) -> Self {
        self.line_number = Some(line_number);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlameStatus {
    Loading,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub start_line: u32,
    pub line_count: u32,
    pub original_start_line: u32,
    pub file_name: String,
    pub commit_id: String,
}

impl From<&Block> for BlockInfo {
    fn from(block: &Block) -> Self {
        Self {
            start_line: block.start_line,
            line_count: block.line_count,
            original_start_line: block.original_start_line,
            file_name: block.file_name.clone(),
            commit_id: block.commit.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineInfo {
    pub line_number: u32,
    pub old_line_number: u32,
    pub is_new: bool,
    /// False while the line still shows provisional content.
    pub resolved: bool,
    pub parts: Vec<LinePart>,
}

impl LineInfo {
    pub fn new(line: &Line, resolved: bool) -> Self {
        Self {
            line_number: line.line_number,
            old_line_number: line.old_line_number,
            is_new: line.is_new(),
            resolved,
            parts: line.parts.clone(),
        }
    }
}

/// Full state of one blame view, polled by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlameSnapshot {
    pub file_name: String,
    pub status: BlameStatus,
    pub error: Option<String>,
    /// Increases on every change; clients compare it to skip unchanged polls.
    pub version: u64,
    pub line_count: u32,
    pub resolved_count: u32,
    pub blocks: Vec<BlockInfo>,
    pub lines: Vec<LineInfo>,
    pub commits: Vec<CommitDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineDetail {
    pub line: LineInfo,
    pub block: BlockInfo,
    pub commit: CommitDetail,
    /// Where to continue blaming this line in the parent version.
    pub previous: Option<BlamePosition>,
}
