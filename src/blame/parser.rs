//! Parser for `git blame --incremental` output.
//!
//! Each record is a header `<commit> <orig-line> <final-line> <count>` followed
//! by `key value` lines; the `filename` key always closes the record. Commit
//! metadata is only present the first time a commit appears, so the commit
//! table keeps the first occurrence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::error::{AppError, Result};
use crate::models::{Block, Commit, Person, PreviousVersion};

/// Blocks ordered by start line, plus the commits they reference.
#[derive(Debug, Default)]
pub struct Attribution {
    pub blocks: Vec<Block>,
    pub commits: HashMap<String, Arc<Commit>>,
}

impl Attribution {
    pub fn line_count(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.line_count)).sum()
    }
}

struct Header<'a> {
    commit_id: &'a str,
    original_start_line: u32,
    start_line: u32,
    line_count: u32,
}

pub fn parse_attribution(output: &str) -> Result<Attribution> {
    let mut attribution = Attribution::default();
    let mut lines = output.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        let header = parse_header(line, index + 1)?;

        let mut tags: HashMap<&str, &str> = HashMap::new();
        loop {
            let Some((_, line)) = lines.next() else {
                return Err(AppError::malformed(format!(
                    "record for {} at line {} has no filename",
                    header.commit_id,
                    index + 1
                )));
            };
            let (key, value) = line.split_once(' ').unwrap_or((line, ""));
            tags.insert(key, value);
            if key == "filename" {
                break;
            }
        }

        let commit = match attribution.commits.get(header.commit_id) {
            Some(commit) => Arc::clone(commit),
            None => {
                let commit = Arc::new(create_commit(header.commit_id, &tags)?);
                attribution
                    .commits
                    .insert(header.commit_id.to_string(), Arc::clone(&commit));
                commit
            }
        };

        let block = Block::new(
            header.start_line,
            header.line_count,
            commit,
            tags["filename"],
            header.original_start_line,
        );
        insert_block(&mut attribution.blocks, block)?;
    }

    Ok(attribution)
}

fn parse_header(line: &str, line_number: usize) -> Result<Header<'_>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [commit_id, original_start_line, start_line, line_count] = fields[..] else {
        return Err(AppError::malformed(format!(
            "line {}: expected `<commit> <orig> <final> <count>`, got {:?}",
            line_number, line
        )));
    };

    let number = |field: &str, name: &str| -> Result<u32> {
        match field.parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(AppError::malformed(format!(
                "line {}: invalid {} {:?}",
                line_number, name, field
            ))),
        }
    };

    let header = Header {
        commit_id,
        original_start_line: number(original_start_line, "original start line")?,
        start_line: number(start_line, "start line")?,
        line_count: number(line_count, "line count")?,
    };
    // Block ends are exclusive and must stay representable.
    if header.start_line.checked_add(header.line_count).is_none()
        || header.original_start_line.checked_add(header.line_count).is_none()
    {
        return Err(AppError::malformed(format!(
            "line {}: range {:?} runs past the last representable line",
            line_number, line
        )));
    }
    Ok(header)
}

/// Inserts in start-line order; a repeated start line means contradictory input.
fn insert_block(blocks: &mut Vec<Block>, block: Block) -> Result<()> {
    match blocks.binary_search_by_key(&block.start_line, |b| b.start_line) {
        Ok(_) => Err(AppError::consistency(format!(
            "two attribution blocks start at line {}",
            block.start_line
        ))),
        Err(index) => {
            blocks.insert(index, block);
            Ok(())
        }
    }
}

fn create_commit(commit_id: &str, tags: &HashMap<&str, &str>) -> Result<Commit> {
    let tag = |key: &str| -> Result<&str> {
        tags.get(key)
            .copied()
            .ok_or_else(|| AppError::malformed(format!("commit {} has no `{}`", commit_id, key)))
    };

    let author = Person::new(tag("author")?, parse_email(tag("author-mail")?));
    let author_date = parse_timestamp(tag("author-time")?, tag("author-tz")?)?;
    let committer = Person::new(tag("committer")?, parse_email(tag("committer-mail")?));
    let commit_date = parse_timestamp(tag("committer-time")?, tag("committer-tz")?)?;
    let summary = tag("summary")?;

    let previous = tags.get("previous").map(|value| match value.split_once(' ') {
        Some((id, file_name)) => PreviousVersion {
            commit_id: id.to_string(),
            file_name: file_name.to_string(),
        },
        None => PreviousVersion {
            commit_id: value.to_string(),
            file_name: tags.get("filename").copied().unwrap_or_default().to_string(),
        },
    });

    Ok(Commit::new(
        commit_id,
        author,
        author_date,
        committer,
        commit_date,
        summary,
        previous,
    ))
}

/// Strips the angle brackets around a mail value, if present.
pub fn parse_email(value: &str) -> &str {
    value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value)
}

/// Parses epoch seconds (fractions allowed) and a `±HHMM` zone into a zoned time.
pub fn parse_timestamp(seconds: &str, time_zone: &str) -> Result<DateTime<FixedOffset>> {
    let invalid = || AppError::malformed(format!("invalid timestamp {:?} {:?}", seconds, time_zone));

    let value: f64 = seconds.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    let whole = value.floor();
    let nanos = (((value - whole) * 1e9).round() as u32).min(999_999_999);
    let instant = DateTime::from_timestamp(whole as i64, nanos).ok_or_else(invalid)?;

    Ok(instant.with_timezone(&parse_time_zone(time_zone).ok_or_else(invalid)?))
}

fn parse_time_zone(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.len() != 5 {
        return None;
    }
    let sign = match value.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = |range: std::ops::Range<usize>| -> Option<i32> {
        let text = value.get(range)?;
        if text.bytes().all(|b| b.is_ascii_digit()) {
            text.parse().ok()
        } else {
            None
        }
    };
    let hours = digits(1..3)?;
    let minutes = digits(3..5)?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
