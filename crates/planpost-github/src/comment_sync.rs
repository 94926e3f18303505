//! Reads and writes the plan comment on the forge.

use anyhow::Result;
use planpost_core::comment_header::keys;
use planpost_core::{
    find_comment, render_comment_body, Comment, CommentUpdate, RemoteComment, RequiredHeaders,
};
use serde_json::Value;

use crate::github_api_client::{CommentTransport, GithubApiClient};

pub const COMMENT_FORMAT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What identifies the comment to reuse on the pull request.
#[derive(Debug, Clone)]
pub struct CommentQuery<'a> {
    pub issue_url: &'a str,
    pub username: &'a str,
    pub headers: &'a RequiredHeaders,
    pub backup_headers: &'a RequiredHeaders,
    pub legacy_description: &'a str,
}

pub async fn find_pr_comment(client: &GithubApiClient, query: CommentQuery<'_>) -> Result<Comment> {
    let candidates: Vec<RemoteComment> = client
        .list_issue_comments(query.issue_url)
        .await?
        .into_iter()
        .filter(|comment| comment.user.login == query.username)
        .map(|comment| comment.into_remote())
        .collect();
    tracing::debug!(
        candidates = candidates.len(),
        username = query.username,
        "fetched candidate comments"
    );
    Ok(find_comment(
        query.issue_url,
        &candidates,
        query.headers,
        query.backup_headers,
        query.legacy_description,
    ))
}

/// Writes an updated comment, creating it when it has not been posted yet.
///
/// The `version` header is always stamped with the current format version.
pub async fn update_comment<T>(
    transport: &T,
    comment: &Comment,
    update: CommentUpdate,
) -> Result<Comment>
where
    T: CommentTransport + ?Sized,
{
    let mut headers = update
        .headers
        .clone()
        .unwrap_or_else(|| comment.headers().clone());
    headers.insert(
        keys::VERSION.to_string(),
        Value::String(COMMENT_FORMAT_VERSION.to_string()),
    );
    let new_comment = comment.updated(CommentUpdate {
        headers: Some(headers),
        ..update
    });
    let body = render_comment_body(&new_comment);

    match comment.comment_url() {
        Some(comment_url) => {
            tracing::info!(%comment_url, "updating pull request comment");
            transport.update_comment(comment_url, &body).await?;
            Ok(new_comment)
        }
        None => {
            tracing::info!(issue_url = comment.issue_url(), "creating pull request comment");
            let comment_url = transport.create_comment(comment.issue_url(), &body).await?;
            Ok(new_comment.bind_comment_url(comment_url)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{update_comment, COMMENT_FORMAT_VERSION};
    use crate::github_api_client::CommentTransport;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use planpost_core::{
        parse_comment_body, Comment, CommentLink, CommentUpdate, HeaderMap, Section,
    };
    use serde_json::json;
    use std::sync::Mutex;

    const ISSUE_URL: &str = "https://api.github.com/repos/o/r/issues/2";

    #[derive(Default)]
    struct RecordingTransport {
        created: Mutex<Vec<(String, String)>>,
        updated: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl CommentTransport for RecordingTransport {
        async fn create_comment(&self, issue_url: &str, body: &str) -> Result<String> {
            if self.fail {
                bail!("github api create issue comment failed with status 500");
            }
            self.created
                .lock()
                .expect("lock")
                .push((issue_url.to_string(), body.to_string()));
            Ok(format!("{issue_url}/comments/77"))
        }

        async fn update_comment(&self, comment_url: &str, body: &str) -> Result<()> {
            if self.fail {
                bail!("github api update issue comment failed with status 500");
            }
            self.updated
                .lock()
                .expect("lock")
                .push((comment_url.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn functional_update_comment_creates_and_binds_unposted_comment() {
        let transport = RecordingTransport::default();
        let comment = Comment::unposted(ISSUE_URL, HeaderMap::new());
        let posted = update_comment(
            &transport,
            &comment,
            CommentUpdate {
                description: Some("Terragrunt plan in __infra__".into()),
                sections: Some(vec![Section::new(Some("a".into()), "Plan: 1 to add.")]),
                ..CommentUpdate::default()
            },
        )
        .await
        .expect("update");

        assert_eq!(
            posted.comment_url(),
            Some("https://api.github.com/repos/o/r/issues/2/comments/77")
        );
        assert_eq!(posted.headers()["version"], json!(COMMENT_FORMAT_VERSION));
        let created = transport.created.lock().expect("lock");
        assert_eq!(created.len(), 1);
        let parsed = parse_comment_body(ISSUE_URL, "u", &created[0].1).expect("parse");
        assert_eq!(parsed.description(), "Terragrunt plan in __infra__");
        assert!(transport.updated.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn functional_update_comment_patches_posted_comment_status_only() {
        let transport = RecordingTransport::default();
        let comment = Comment::new(
            ISSUE_URL,
            CommentLink::Posted("https://c/5".into()),
            HeaderMap::from([("label".to_string(), json!("prod"))]),
            "desc",
            vec![Section::new(None, "body")],
            "",
        );
        let updated = update_comment(
            &transport,
            &comment,
            CommentUpdate {
                status: Some(":x: failed".into()),
                ..CommentUpdate::default()
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.comment_url(), Some("https://c/5"));
        assert_eq!(updated.status(), ":x: failed");
        assert_eq!(updated.headers()["label"], json!("prod"));
        let patched = transport.updated.lock().expect("lock");
        assert_eq!(patched[0].0, "https://c/5");
        assert!(patched[0].1.ends_with(":x: failed"));
    }

    #[tokio::test]
    async fn regression_update_comment_propagates_transport_failure() {
        let transport = RecordingTransport {
            fail: true,
            ..RecordingTransport::default()
        };
        let comment = Comment::unposted(ISSUE_URL, HeaderMap::new());
        let error = update_comment(&transport, &comment, CommentUpdate::default())
            .await
            .expect_err("failure");
        assert!(error.to_string().contains("status 500"));
    }
}
