//! Turns a directory of rendered plan files into comment sections and
//! approval fingerprints.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::comment::{PlanHashRecord, Section};
use crate::fingerprint::fingerprint;

pub const MAX_PLAN_BODY_BYTES: usize = 50_000;
pub const TRUNCATION_NOTICE: &str =
    "Plan is too large to fit in a PR comment. See the full plan in the workflow log.";
pub const EMPTY_PLAN_BODY: &str = "Plan generated.";
const MODULE_PATH_SEPARATOR: &str = "___";

#[derive(Debug, Error)]
pub enum PlanFileError {
    #[error("failed to read plan directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read plan file {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One rendered plan file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanFile {
    pub name: String,
    pub text: String,
}

impl PlanFile {
    /// Module path encoded in the file name, `a___b` for `a/b`.
    pub fn module_name(&self) -> String {
        self.name.replace(MODULE_PATH_SEPARATOR, "/")
    }
}

/// Reads every regular file in `dir`, ordered by file name.
pub fn read_plan_files(dir: &Path) -> Result<Vec<PlanFile>, PlanFileError> {
    let read_dir_error = |source| PlanFileError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_dir_error)? {
        let entry = entry.map_err(read_dir_error)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|source| PlanFileError::ReadFile {
            path: path.clone(),
            source,
        })?;
        files.push(PlanFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            text,
        });
    }
    files.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(files)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanText {
    Complete(String),
    Truncated(String),
}

impl PlanText {
    pub fn text(&self) -> &str {
        match self {
            Self::Complete(text) | Self::Truncated(text) => text,
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated(_))
    }
}

/// Caps plan text at [`MAX_PLAN_BODY_BYTES`]. Oversized text keeps whole
/// lines up to the budget and ends with [`TRUNCATION_NOTICE`].
pub fn format_plan_text(plan_text: &str) -> PlanText {
    if plan_text.len() <= MAX_PLAN_BODY_BYTES {
        return PlanText::Complete(plan_text.to_string());
    }

    let mut lines = Vec::new();
    let mut total_size = 0_usize;
    for line in plan_text.lines() {
        let line_size = line.len() + 1;
        if total_size + line_size > MAX_PLAN_BODY_BYTES {
            lines.push(TRUNCATION_NOTICE);
            break;
        }
        lines.push(line);
        total_size += line_size;
    }
    PlanText::Truncated(lines.join("\n"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSections {
    pub sections: Vec<Section>,
    pub truncated: bool,
}

pub fn build_sections(files: &[PlanFile]) -> PlanSections {
    if files.is_empty() {
        return PlanSections {
            sections: vec![Section::new(None, EMPTY_PLAN_BODY)],
            truncated: false,
        };
    }

    let mut truncated = false;
    let sections = files
        .iter()
        .map(|file| {
            let body = format_plan_text(&file.text);
            truncated |= body.is_truncated();
            let module = file.module_name();
            let summary = match plan_summary(&file.text) {
                Some(summary) => format!("{module}: {summary}"),
                None => module,
            };
            Section::new(Some(summary), body.text())
        })
        .collect();
    PlanSections {
        sections,
        truncated,
    }
}

/// Picks the line that best summarizes a plan.
pub fn plan_summary(plan_text: &str) -> Option<String> {
    let mut summary: Option<String> = None;
    let mut to_move = 0_usize;
    for line in plan_text.lines() {
        let line = line.trim_end();
        if line.starts_with("No changes") || line.starts_with("Error") {
            summary = Some(line.to_string());
        }
        if is_move_line(line) {
            to_move += 1;
        }
        if line.starts_with("Plan:") {
            let mut plan_line = line.to_string();
            if to_move > 0 && !plan_line.contains("move") {
                plan_line = format!("{}, {to_move} to move.", plan_line.trim_end_matches('.'));
            }
            summary = Some(plan_line);
        }
        if line.starts_with("Changes to Outputs") {
            summary = Some(match summary {
                Some(existing) => format!("{existing} Changes to Outputs."),
                None => line.to_string(),
            });
        }
    }
    summary
}

/// `  # module.a has moved to module.b`
fn is_move_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("  # ") else {
        return false;
    };
    let Some((from, to)) = rest.split_once(" has moved to ") else {
        return false;
    };
    let is_address = |value: &str| !value.is_empty() && !value.contains(char::is_whitespace);
    is_address(from) && is_address(to)
}

/// Approval fingerprint of one plan file, salted with the issue URL.
pub fn plan_hash(plan_text: &str, issue_url: &str) -> String {
    fingerprint(plan_text.trim(), issue_url)
}

pub fn plan_hash_records(files: &[PlanFile], issue_url: &str) -> Vec<PlanHashRecord> {
    files
        .iter()
        .map(|file| PlanHashRecord {
            plan_name: file.name.clone(),
            plan_hash: plan_hash(&file.text, issue_url),
        })
        .collect()
}
