//! Line-oriented parser for rendered plan comments.
//!
//! The grammar is the one written by [`crate::comment_render`]:
//!
//! ```text
//! body     := [header] description block+ status
//! header   := "<!--" ... "-->"                      (first line only)
//! block    := details blank* [summary blank*] fence-open line* fence-close blank* "</details>"
//! status   := any text after the last block
//! ```
//!
//! A fence is three or more backticks; a block closes only on a fence of the
//! same length as the one that opened it.
//!
//! Any input that does not follow the grammar yields `None`; the parser never
//! panics.

use crate::comment::{Comment, CommentLink, Section};
use crate::comment_header::{decode_comment_header, is_header_line, HeaderMap};
use crate::comment_render::{
    DETAILS_CLOSED_TAG, DETAILS_END_TAG, DETAILS_OPEN_TAG, FENCE_CHAR, MIN_FENCE_LEN,
};

const SUMMARY_START_TAG: &str = "<summary>";
const SUMMARY_END_TAG: &str = "</summary>";

/// Recovers a comment from its markdown body, or `None` when the body holds
/// no collapsible blocks or a block is malformed.
pub fn parse_comment_body(issue_url: &str, comment_url: &str, body: &str) -> Option<Comment> {
    let lines: Vec<&str> = body.lines().collect();

    let mut index = 0;
    let headers = match lines.first() {
        Some(line) if is_header_line(line) => {
            index = 1;
            decode_comment_header(line)
        }
        _ => HeaderMap::new(),
    };

    let description_start = index;
    while index < lines.len() && !is_details_start(lines[index]) {
        index += 1;
    }
    if index >= lines.len() {
        return None;
    }
    let description = lines[description_start..index].join("\n");

    let mut sections = Vec::new();
    loop {
        let (section, next) = parse_section(&lines, index)?;
        sections.push(section);
        index = skip_blank(&lines, next);
        if !lines.get(index).is_some_and(|line| is_details_start(line)) {
            break;
        }
    }
    let status = lines.get(index..).unwrap_or_default().join("\n");

    Some(Comment::new(
        issue_url,
        CommentLink::Posted(comment_url.to_string()),
        headers,
        &description,
        sections,
        &status,
    ))
}

fn parse_section(lines: &[&str], start: usize) -> Option<(Section, usize)> {
    if !is_details_start(lines.get(start)?) {
        return None;
    }
    let mut index = skip_blank(lines, start + 1);

    let summary = summary_text(lines.get(index)?).map(str::to_string);
    if summary.is_some() {
        index = skip_blank(lines, index + 1);
    }

    let fence_len = fence_open_len(lines.get(index)?)?;
    let body_start = index + 1;
    let body_end = body_start
        + lines
            .get(body_start..)?
            .iter()
            .position(|line| is_fence_close(line, fence_len))?;
    let body = lines[body_start..body_end].join("\n");

    let index = skip_blank(lines, body_end + 1);
    if lines.get(index)?.trim() != DETAILS_END_TAG {
        return None;
    }
    Some((Section::new(summary, body), index + 1))
}

fn is_details_start(line: &str) -> bool {
    matches!(line.trim(), DETAILS_OPEN_TAG | DETAILS_CLOSED_TAG)
}

fn summary_text(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix(SUMMARY_START_TAG)?
        .strip_suffix(SUMMARY_END_TAG)
        .map(str::trim)
}

/// Length of a fence opener: three or more backticks followed by an optional
/// language tag.
fn fence_open_len(line: &str) -> Option<usize> {
    let line = line.trim_end();
    let fence_len = line.chars().take_while(|ch| *ch == FENCE_CHAR).count();
    let language = &line[fence_len..];
    (fence_len >= MIN_FENCE_LEN && language.chars().all(|ch| ch.is_ascii_alphanumeric()))
        .then_some(fence_len)
}

fn is_fence_close(line: &str, fence_len: usize) -> bool {
    let line = line.trim_end();
    line.len() == fence_len && line.chars().all(|ch| ch == FENCE_CHAR)
}

fn skip_blank(lines: &[&str], mut index: usize) -> usize {
    while lines.get(index).is_some_and(|line| line.trim().is_empty()) {
        index += 1;
    }
    index
}
