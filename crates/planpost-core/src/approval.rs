//! Decides whether the plan shown on the pull request is still the plan that
//! would be applied.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::comment::Comment;
use crate::plan_sections::{plan_hash, read_plan_files, PlanFile, PlanFileError};

pub const FAILURE_REASON_PLAN_CHANGED: &str = "plan-changed";
pub const FAILURE_REASON_PLAN_COUNT_CHANGED: &str = "number-of-plans-changed";

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("plan not found on the pull request")]
    NoExistingComment,
    #[error("found {plan_files} plan files but the pull request comment has {sections} plans")]
    PlanCountChanged { plan_files: usize, sections: usize },
    #[error(transparent)]
    PlanFiles(#[from] PlanFileError),
}

impl ApprovalError {
    /// Machine-readable reason reported to the workflow, if any.
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            Self::NoExistingComment => Some(FAILURE_REASON_PLAN_CHANGED),
            Self::PlanCountChanged { .. } => Some(FAILURE_REASON_PLAN_COUNT_CHANGED),
            Self::PlanFiles(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    /// Plan files whose fingerprint is missing or differs, by file name.
    PlanChanged { changed: Vec<String> },
}

impl ApprovalOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

pub fn evaluate_approval(
    plan_dir: &Path,
    comment: &Comment,
) -> Result<ApprovalOutcome, ApprovalError> {
    if comment.comment_url().is_none() {
        return Err(ApprovalError::NoExistingComment);
    }
    let files = read_plan_files(plan_dir)?;
    evaluate_plan_files(&files, comment)
}

/// Same as [`evaluate_approval`] for plan files already in memory.
pub fn evaluate_plan_files(
    files: &[PlanFile],
    comment: &Comment,
) -> Result<ApprovalOutcome, ApprovalError> {
    if comment.comment_url().is_none() {
        return Err(ApprovalError::NoExistingComment);
    }
    if files.len() != comment.sections().len() {
        return Err(ApprovalError::PlanCountChanged {
            plan_files: files.len(),
            sections: comment.sections().len(),
        });
    }

    let recorded: BTreeMap<String, String> = comment
        .plan_hashes()
        .into_iter()
        .map(|record| (record.plan_name, record.plan_hash))
        .collect();

    let changed: Vec<String> = files
        .iter()
        .filter(|file| {
            let current = plan_hash(&file.text, comment.issue_url());
            recorded.get(&file.name) != Some(&current)
        })
        .map(|file| file.name.clone())
        .collect();

    if changed.is_empty() {
        if comment.is_truncated() {
            tracing::debug!("comment shows a truncated plan; hashes cover the full plan files");
        }
        tracing::debug!("approving plan based on plan hash");
        Ok(ApprovalOutcome::Approved)
    } else {
        tracing::debug!(?changed, "plan hashes differ from the pull request comment");
        Ok(ApprovalOutcome::PlanChanged { changed })
    }
}
