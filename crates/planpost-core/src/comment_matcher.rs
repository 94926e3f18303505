//! Re-identifies the comment that belongs to the current plan.
//!
//! Candidates are scanned in stream order with three tiers of decreasing
//! priority: exact header match (returned immediately), backup header match
//! (first one wins, headers merged), and legacy description match for
//! comments written before headers existed (first one wins, headers replaced).

use serde::{Deserialize, Serialize};

use crate::comment::Comment;
use crate::comment_header::{matches_headers, present_headers, RequiredHeaders};
use crate::comment_parser::parse_comment_body;

/// A comment as returned by the forge, already filtered to the expected author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteComment {
    pub url: String,
    pub issue_url: String,
    #[serde(default)]
    pub body: String,
}

pub fn find_comment<'a>(
    issue_url: &str,
    candidates: impl IntoIterator<Item = &'a RemoteComment>,
    headers: &RequiredHeaders,
    backup_headers: &RequiredHeaders,
    legacy_description: &str,
) -> Comment {
    tracing::debug!(?headers, ?backup_headers, "searching for plan comment");

    let mut backup_comment = None;
    let mut legacy_comment = None;

    for candidate in candidates {
        let Some(comment) =
            parse_comment_body(&candidate.issue_url, &candidate.url, &candidate.body)
        else {
            tracing::debug!(url = %candidate.url, "skipping comment without plan blocks");
            continue;
        };

        if !comment.is_legacy() {
            if matches_headers(comment.headers(), headers) {
                tracing::debug!(
                    url = %candidate.url,
                    headers = ?comment.headers(),
                    "found comment matching headers"
                );
                return comment;
            }
            if backup_comment.is_none() && matches_headers(comment.headers(), backup_headers) {
                tracing::debug!(
                    url = %candidate.url,
                    headers = ?comment.headers(),
                    "found comment matching backup headers"
                );
                backup_comment = Some(comment);
            } else {
                tracing::debug!(
                    url = %candidate.url,
                    headers = ?comment.headers(),
                    "headers did not match"
                );
            }
        } else if legacy_comment.is_none() && comment.description() == legacy_description {
            tracing::debug!(url = %candidate.url, "found comment matching legacy description");
            legacy_comment = Some(comment);
        } else {
            tracing::debug!(
                url = %candidate.url,
                description = comment.description(),
                "description did not match"
            );
        }
    }

    if let Some(comment) = backup_comment {
        tracing::debug!("using comment matching backup headers");
        let mut merged = comment.headers().clone();
        for (key, value) in headers {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        return comment.with_headers(merged);
    }

    if let Some(comment) = legacy_comment {
        tracing::debug!("using comment matching legacy description");
        return comment.with_headers(present_headers(headers));
    }

    tracing::debug!("no existing comment found");
    Comment::unposted(issue_url, present_headers(headers))
}
