//! The plan comment value type.
//!
//! A `Comment` is immutable: updates build a new value through
//! [`Comment::updated`], and the remote URL moves from unposted to posted
//! exactly once through [`Comment::bind_comment_url`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::comment_header::{keys, HeaderMap};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentError {
    #[error("invalid comment state: {0}")]
    InvalidState(String),
}

/// Whether the comment exists on the forge yet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum CommentLink {
    #[default]
    Unposted,
    Posted(String),
}

impl CommentLink {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Unposted => None,
            Self::Posted(url) => Some(url.as_str()),
        }
    }
}

impl From<Option<String>> for CommentLink {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(url) => Self::Posted(url),
            None => Self::Unposted,
        }
    }
}

impl From<CommentLink> for Option<String> {
    fn from(value: CommentLink) -> Self {
        match value {
            CommentLink::Unposted => None,
            CommentLink::Posted(url) => Some(url),
        }
    }
}

/// One collapsible block of the comment body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub summary: Option<String>,
    pub body: String,
}

impl Section {
    pub fn new(summary: Option<String>, body: impl Into<String>) -> Self {
        Self {
            summary: summary.map(|summary| summary.trim().to_string()),
            body: body.into().replace("\r\n", "\n").trim().to_string(),
        }
    }
}

/// Fingerprint of one plan file, stored in the `plan_hashes` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanHashRecord {
    pub plan_name: String,
    pub plan_hash: String,
}

/// Fields to override when producing an updated comment. `None` keeps the
/// existing value.
#[derive(Debug, Clone, Default)]
pub struct CommentUpdate {
    pub headers: Option<HeaderMap>,
    pub description: Option<String>,
    pub sections: Option<Vec<Section>>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    issue_url: String,
    comment_url: CommentLink,
    headers: HeaderMap,
    description: String,
    sections: Vec<Section>,
    status: String,
}

impl Comment {
    pub fn new(
        issue_url: impl Into<String>,
        comment_url: CommentLink,
        headers: HeaderMap,
        description: &str,
        sections: Vec<Section>,
        status: &str,
    ) -> Self {
        Self {
            issue_url: issue_url.into(),
            comment_url,
            headers,
            description: description.trim().to_string(),
            sections,
            status: status.trim().to_string(),
        }
    }

    /// A comment that has not been created on the forge yet.
    pub fn unposted(issue_url: impl Into<String>, headers: HeaderMap) -> Self {
        Self::new(issue_url, CommentLink::Unposted, headers, "", Vec::new(), "")
    }

    pub fn issue_url(&self) -> &str {
        &self.issue_url
    }

    pub fn comment_url(&self) -> Option<&str> {
        self.comment_url.url()
    }

    pub fn link(&self) -> &CommentLink {
        &self.comment_url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Comments without a header token predate the header format.
    pub fn is_legacy(&self) -> bool {
        self.headers.is_empty()
    }

    /// Recorded plan fingerprints. Malformed records are skipped.
    pub fn plan_hashes(&self) -> Vec<PlanHashRecord> {
        match self.headers.get(keys::PLAN_HASHES) {
            Some(Value::Array(records)) => records
                .iter()
                .filter_map(|record| serde_json::from_value(record.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.headers.get(keys::TRUNCATED) == Some(&Value::Bool(true))
    }

    pub fn with_headers(self, headers: HeaderMap) -> Self {
        Self { headers, ..self }
    }

    /// Builds a new comment with the overridden fields of `update`.
    pub fn updated(&self, update: CommentUpdate) -> Self {
        Self::new(
            self.issue_url.clone(),
            self.comment_url.clone(),
            update.headers.unwrap_or_else(|| self.headers.clone()),
            update.description.as_deref().unwrap_or(&self.description),
            update.sections.unwrap_or_else(|| self.sections.clone()),
            update.status.as_deref().unwrap_or(&self.status),
        )
    }

    /// Records the URL returned when the comment was first created.
    pub fn bind_comment_url(self, url: impl Into<String>) -> Result<Self, CommentError> {
        match &self.comment_url {
            CommentLink::Posted(existing) => Err(CommentError::InvalidState(format!(
                "comment is already posted at {existing}"
            ))),
            CommentLink::Unposted => Ok(Self {
                comment_url: CommentLink::Posted(url.into()),
                ..self
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Comment, CommentError, CommentLink, CommentUpdate, PlanHashRecord, Section};
    use crate::comment_header::HeaderMap;
    use serde_json::json;

    const ISSUE_URL: &str = "https://api.github.com/repos/o/r/issues/7";

    fn sample() -> Comment {
        Comment::new(
            ISSUE_URL,
            CommentLink::Posted("https://api.github.com/repos/o/r/issues/comments/1".into()),
            HeaderMap::from([("label".to_string(), json!("prod"))]),
            "  Terragrunt plan in __infra__\n",
            vec![Section::new(Some("a: Plan: 1 to add.".into()), "Plan: 1 to add.\n")],
            " status ",
        )
    }

    #[test]
    fn unit_new_trims_description_status_and_section_text() {
        let comment = sample();
        assert_eq!(comment.description(), "Terragrunt plan in __infra__");
        assert_eq!(comment.status(), "status");
        assert_eq!(comment.sections()[0].body, "Plan: 1 to add.");
    }

    #[test]
    fn regression_section_new_normalizes_crlf_so_render_round_trips() {
        let section = Section::new(Some("a".into()), "line1\r\nline2\r\n");
        assert_eq!(section.body, "line1\nline2");

        let comment = sample().updated(CommentUpdate {
            sections: Some(vec![section]),
            ..CommentUpdate::default()
        });
        let rendered = crate::comment_render::render_comment_body(&comment);
        let parsed = crate::comment_parser::parse_comment_body(
            ISSUE_URL,
            "https://api.github.com/repos/o/r/issues/comments/1",
            &rendered,
        )
        .expect("parsed");
        assert_eq!(parsed, comment);
    }

    #[test]
    fn unit_bind_comment_url_transitions_unposted_once() {
        let comment = Comment::unposted(ISSUE_URL, HeaderMap::new());
        assert_eq!(comment.comment_url(), None);
        let posted = comment.bind_comment_url("https://c/1").expect("bind");
        assert_eq!(posted.comment_url(), Some("https://c/1"));

        let error = posted
            .bind_comment_url("https://c/2")
            .expect_err("second bind must fail");
        assert!(matches!(error, CommentError::InvalidState(_)));
    }

    #[test]
    fn functional_updated_overrides_only_given_fields() {
        let comment = sample();
        let updated = comment.updated(CommentUpdate {
            status: Some(":x: failed".into()),
            ..CommentUpdate::default()
        });
        assert_eq!(updated.status(), ":x: failed");
        assert_eq!(updated.description(), comment.description());
        assert_eq!(updated.sections(), comment.sections());
        assert_eq!(updated.headers(), comment.headers());
        assert_eq!(updated.comment_url(), comment.comment_url());
    }

    #[test]
    fn integration_comment_serializes_for_step_cache() {
        let comment = sample();
        let raw = serde_json::to_string(&comment).expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(
            value["comment_url"],
            json!("https://api.github.com/repos/o/r/issues/comments/1")
        );
        let restored: Comment = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(restored, comment);

        let unposted = Comment::unposted(ISSUE_URL, HeaderMap::new());
        let raw = serde_json::to_string(&unposted).expect("serialize");
        assert!(raw.contains("\"comment_url\":null"));
    }

    #[test]
    fn regression_plan_hashes_skips_malformed_records() {
        let comment = sample().with_headers(HeaderMap::from([(
            "plan_hashes".to_string(),
            json!([{"plan_name": "a", "plan_hash": "1"}, {"plan_name": 3}]),
        )]));
        assert_eq!(
            comment.plan_hashes(),
            vec![PlanHashRecord {
                plan_name: "a".into(),
                plan_hash: "1".into()
            }]
        );
        assert!(Comment::unposted(ISSUE_URL, HeaderMap::new())
            .plan_hashes()
            .is_empty());
    }
}
