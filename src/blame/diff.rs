//! Character-level diff of two file versions, regrouped into lines.
//!
//! The diff runs by line first (imara-diff, histogram) and then refines every
//! changed region by character (Myers). A semantic cleanup pass folds short
//! equalities that sit between larger edits into the surrounding change.
//!
//! `DiffReconciler::lines` walks the resulting `Equal`/`Insert`/`Delete`
//! operations and yields every line of the new version with its spans marked
//! `Existing` or `New`, together with the old line number it starts at.

use std::hash::Hash;
use std::ops::Range;

use imara_diff::{Algorithm, Diff, InternedInput, TokenSource};

use super::text::split_lines_with_terminators;
use crate::models::{Line, LinePartStatus};

/// Above this many lines in either version, changed regions are not refined
/// by character.
pub const LINE_MODE_THRESHOLD: usize = 30_000;

/// Changed regions larger than this (in bytes, per side) stay line-granular.
const MAX_REFINE_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    Equal(String),
    Insert(String),
    Delete(String),
}

impl DiffOp {
    pub fn text(&self) -> &str {
        match self {
            DiffOp::Equal(text) | DiffOp::Insert(text) | DiffOp::Delete(text) => text,
        }
    }
}

/// Token source over a slice, so lines and characters share one diff routine.
struct SliceTokenSource<'a, T> {
    slice: &'a [T],
}

impl<'a, T: Clone + Hash + Eq> TokenSource for SliceTokenSource<'a, T> {
    type Token = T;
    type Tokenizer = std::iter::Cloned<std::slice::Iter<'a, T>>;

    fn tokenize(&self) -> Self::Tokenizer {
        self.slice.iter().cloned()
    }

    fn estimate_tokens(&self) -> u32 {
        self.slice.len() as u32
    }
}

/// Changed regions between two token slices, as (old range, new range) pairs.
fn changed_regions<T: Clone + Hash + Eq>(
    old: &[T],
    new: &[T],
    algorithm: Algorithm,
) -> Vec<(Range<usize>, Range<usize>)> {
    let input = InternedInput::new(SliceTokenSource { slice: old }, SliceTokenSource { slice: new });
    let diff = Diff::compute(algorithm, &input);
    diff.hunks()
        .map(|hunk| {
            (
                hunk.before.start as usize..hunk.before.end as usize,
                hunk.after.start as usize..hunk.after.end as usize,
            )
        })
        .collect()
}

/// Diffs two texts into an operation stream.
///
/// Concatenating `Equal` and `Delete` texts gives `old`; concatenating `Equal`
/// and `Insert` texts gives `new`.
pub fn diff_text(old: &str, new: &str) -> Vec<DiffOp> {
    let old_lines = split_lines_with_terminators(old);
    let new_lines = split_lines_with_terminators(new);

    let line_mode = old_lines.len() > LINE_MODE_THRESHOLD || new_lines.len() > LINE_MODE_THRESHOLD;
    if line_mode {
        tracing::debug!(
            "Diffing {} -> {} lines in line mode",
            old_lines.len(),
            new_lines.len()
        );
    }

    let mut ops = Vec::new();
    let mut new_index = 0;

    for (before, after) in changed_regions(&old_lines, &new_lines, Algorithm::Histogram) {
        if new_index < after.start {
            ops.push(DiffOp::Equal(new_lines[new_index..after.start].concat()));
        }

        let deleted = old_lines[before].concat();
        let inserted = new_lines[after.clone()].concat();
        let refine = !line_mode
            && !deleted.is_empty()
            && !inserted.is_empty()
            && deleted.len() <= MAX_REFINE_BYTES
            && inserted.len() <= MAX_REFINE_BYTES;

        if refine {
            ops.extend(diff_chars(&deleted, &inserted));
        } else {
            if !deleted.is_empty() {
                ops.push(DiffOp::Delete(deleted));
            }
            if !inserted.is_empty() {
                ops.push(DiffOp::Insert(inserted));
            }
        }

        new_index = after.end;
    }

    if new_index < new_lines.len() {
        ops.push(DiffOp::Equal(new_lines[new_index..].concat()));
    }

    cleanup_semantic(ops)
}

fn diff_chars(old: &str, new: &str) -> Vec<DiffOp> {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let mut ops = Vec::new();
    let mut new_index = 0;

    for (before, after) in changed_regions(&old_chars, &new_chars, Algorithm::Myers) {
        if new_index < after.start {
            ops.push(DiffOp::Equal(new_chars[new_index..after.start].iter().collect()));
        }
        if !before.is_empty() {
            ops.push(DiffOp::Delete(old_chars[before].iter().collect()));
        }
        if !after.is_empty() {
            ops.push(DiffOp::Insert(new_chars[after.clone()].iter().collect()));
        }
        new_index = after.end;
    }

    if new_index < new_chars.len() {
        ops.push(DiffOp::Equal(new_chars[new_index..].iter().collect()));
    }

    ops
}

enum Segment {
    Equal(String),
    Change { deleted: String, inserted: String },
}

impl Segment {
    /// Size of the larger side of a change, in characters.
    fn edit_size(&self) -> usize {
        match self {
            Segment::Equal(_) => 0,
            Segment::Change { deleted, inserted } => deleted.chars().count().max(inserted.chars().count()),
        }
    }
}

/// Folds short single-line equalities between two larger edits into one change,
/// then emits each change as `Delete` followed by `Insert`.
fn cleanup_semantic(ops: Vec<DiffOp>) -> Vec<DiffOp> {
    let mut segments: Vec<Segment> = Vec::with_capacity(ops.len());

    for op in ops {
        let (mut deleted, mut inserted) = match op {
            DiffOp::Equal(text) => {
                match segments.last_mut() {
                    Some(Segment::Equal(last)) => last.push_str(&text),
                    _ => segments.push(Segment::Equal(text)),
                }
                continue;
            }
            DiffOp::Delete(text) => (text, String::new()),
            DiffOp::Insert(text) => (String::new(), text),
        };

        if let Some(Segment::Change {
            deleted: last_deleted,
            inserted: last_inserted,
        }) = segments.last_mut()
        {
            last_deleted.push_str(&deleted);
            last_inserted.push_str(&inserted);
            continue;
        }

        // [.., Change, Equal] + Change: absorb the equality if it is short
        while segments.len() >= 2 {
            let len = segments.len();
            let Segment::Equal(equal) = &segments[len - 1] else {
                break;
            };
            let equal_size = equal.chars().count();
            let after_size = deleted.chars().count().max(inserted.chars().count());
            let absorbable = !equal.contains('\n')
                && matches!(segments[len - 2], Segment::Change { .. })
                && equal_size <= segments[len - 2].edit_size()
                && equal_size <= after_size;
            if !absorbable {
                break;
            }

            let Some(Segment::Equal(equal)) = segments.pop() else {
                break;
            };
            let Some(Segment::Change {
                deleted: previous_deleted,
                inserted: previous_inserted,
            }) = segments.pop()
            else {
                break;
            };
            deleted = previous_deleted + &equal + &deleted;
            inserted = previous_inserted + &equal + &inserted;
        }

        segments.push(Segment::Change { deleted, inserted });
    }

    let mut ops = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Equal(text) => ops.push(DiffOp::Equal(text)),
            Segment::Change { deleted, inserted } => {
                if !deleted.is_empty() {
                    ops.push(DiffOp::Delete(deleted));
                }
                if !inserted.is_empty() {
                    ops.push(DiffOp::Insert(inserted));
                }
            }
        }
    }
    ops
}

/// Diff between two versions of a file, readable line by line.
#[derive(Debug, Clone)]
pub struct DiffReconciler {
    ops: Vec<DiffOp>,
}

impl DiffReconciler {
    pub fn new(old: &str, new: &str) -> Self {
        Self::from_ops(diff_text(old, new))
    }

    pub fn from_ops(ops: Vec<DiffOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[DiffOp] {
        &self.ops
    }

    /// Lines of the new version, numbered from 1. Each call starts over.
    pub fn lines(&self) -> DiffLines<'_> {
        DiffLines {
            ops: &self.ops,
            index: 0,
            offset: 0,
            line_number: 1,
            old_line_number: 1,
            line_start: None,
            current: Line::new(1, 1, Vec::new()),
            finished: false,
        }
    }
}

/// Lazy walk over a diff, yielding one `Line` per line of the new version.
pub struct DiffLines<'a> {
    ops: &'a [DiffOp],
    index: usize,
    /// Byte offset into `ops[index]` already consumed.
    offset: usize,
    line_number: u32,
    old_line_number: u32,
    /// Old line number when the first text of the current line was seen.
    line_start: Option<u32>,
    current: Line,
    finished: bool,
}

impl DiffLines<'_> {
    fn advance_op(&mut self) {
        self.index += 1;
        self.offset = 0;
    }

    fn take_line(&mut self) -> Line {
        let old_line_number = self.line_start.take().unwrap_or(self.old_line_number);
        let next = Line::new(self.line_number + 1, 0, Vec::new());
        let mut line = std::mem::replace(&mut self.current, next);
        line.line_number = self.line_number;
        line.old_line_number = old_line_number;
        self.line_number += 1;
        line
    }
}

impl Iterator for DiffLines<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if self.finished {
            return None;
        }

        let ops = self.ops;
        loop {
            let Some(op) = ops.get(self.index) else {
                self.finished = true;
                if self.current.parts.is_empty() {
                    return None;
                }
                return Some(self.take_line());
            };

            let (status, is_equal) = match op {
                DiffOp::Delete(text) => {
                    self.old_line_number += text.matches('\n').count() as u32;
                    self.advance_op();
                    continue;
                }
                DiffOp::Equal(_) => (LinePartStatus::Existing, true),
                DiffOp::Insert(_) => (LinePartStatus::New, false),
            };

            let rest = &op.text()[self.offset..];
            match rest.find('\n') {
                Some(newline) => {
                    self.line_start.get_or_insert(self.old_line_number);
                    self.current.push_part(&rest[..newline], status);
                    self.offset += newline + 1;
                    if self.offset == op.text().len() {
                        self.advance_op();
                    }
                    let line = self.take_line();
                    if is_equal {
                        self.old_line_number += 1;
                    }
                    return Some(line);
                }
                None => {
                    if !rest.is_empty() {
                        self.line_start.get_or_insert(self.old_line_number);
                        self.current.push_part(rest, status);
                    }
                    self.advance_op();
                }
            }
        }
    }
}
