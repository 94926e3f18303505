use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use planpost_core::RemoteComment;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::transport_helpers::{
    is_retryable_github_response, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};

const COMMENTS_PER_PAGE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubIssueComment {
    pub url: String,
    pub issue_url: String,
    #[serde(default)]
    pub body: Option<String>,
    pub user: GithubUser,
}

impl GithubIssueComment {
    pub fn into_remote(self) -> RemoteComment {
        RemoteComment {
            url: self.url,
            issue_url: self.issue_url,
            body: self.body.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubCommentResponse {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubPullRequest {
    pub url: String,
    #[serde(default)]
    pub state: String,
}

/// Remote writes for a plan comment. Failures propagate; nothing is retried.
#[async_trait]
pub trait CommentTransport {
    /// Creates a comment on the issue and returns the new comment URL.
    async fn create_comment(&self, issue_url: &str, body: &str) -> Result<String>;
    async fn update_comment(&self, comment_url: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct GithubClientConfig {
    pub api_base: String,
    pub graphql_url: Option<String>,
    pub token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    graphql_url: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    pub fn new(config: GithubClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("github-pr-comment"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", config.token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        let api_base = config.api_base.trim_end_matches('/').to_string();
        let graphql_url = config
            .graphql_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| format!("{api_base}/graphql"));
        Ok(Self {
            http: client,
            api_base,
            graphql_url,
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    /// Login of the token owner, or `None` when neither GraphQL nor REST can
    /// tell. App tokens only work with GraphQL, fine grained PATs only with
    /// REST.
    pub async fn viewer_login(&self) -> Option<String> {
        let graphql = self
            .optional_json::<Value, _>("viewer login (graphql)", || {
                self.http
                    .post(self.graphql_url.as_str())
                    .json(&json!({ "query": "query { viewer { login } }" }))
            })
            .await
            .and_then(|response| {
                response["data"]["viewer"]["login"]
                    .as_str()
                    .map(str::to_string)
            });
        if graphql.is_some() {
            return graphql;
        }
        tracing::debug!("failed to get current user from graphql");

        #[derive(Deserialize)]
        struct Viewer {
            login: String,
        }
        self.optional_json::<Viewer, _>("viewer login (rest)", || {
            self.http.get(format!("{}/user", self.api_base))
        })
        .await
        .map(|viewer| viewer.login)
    }

    /// Resolves the issue URL that carries the comments of a pull request.
    pub async fn pull_request_issue_url(&self, pr_url: &str) -> Result<String> {
        let pull_request: Value = self
            .request_json("get pull request", true, || self.http.get(pr_url))
            .await?;
        pull_request["_links"]["issue"]["href"]
            .as_str()
            .map(str::to_string)
            .with_context(|| format!("pull request {pr_url} has no issue link"))
    }

    pub async fn commit_pull_requests(
        &self,
        repository: &str,
        sha: &str,
    ) -> Result<Vec<GithubPullRequest>> {
        self.request_json("list commit pull requests", true, || {
            self.http
                .get(format!(
                    "{}/repos/{repository}/commits/{sha}/pulls",
                    self.api_base
                ))
                .header(
                    reqwest::header::ACCEPT,
                    "application/vnd.github.groot-preview+json",
                )
        })
        .await
    }

    pub async fn list_issue_comments(&self, issue_url: &str) -> Result<Vec<GithubIssueComment>> {
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_value = page.to_string();
            let per_page = COMMENTS_PER_PAGE.to_string();
            let chunk: Vec<GithubIssueComment> = self
                .request_json("list issue comments", true, || {
                    self.http
                        .get(format!("{issue_url}/comments"))
                        .query(&[("per_page", per_page.as_str()), ("page", page_value.as_str())])
                })
                .await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < COMMENTS_PER_PAGE {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }

    pub async fn create_issue_comment(
        &self,
        issue_url: &str,
        body: &str,
    ) -> Result<GithubCommentResponse> {
        let payload = json!({ "body": body });
        self.request_json("create issue comment", false, || {
            self.http
                .post(format!("{issue_url}/comments"))
                .json(&payload)
        })
        .await
    }

    pub async fn update_issue_comment(
        &self,
        comment_url: &str,
        body: &str,
    ) -> Result<GithubCommentResponse> {
        let payload = json!({ "body": body });
        self.request_json("update issue comment", false, || {
            self.http.patch(comment_url).json(&payload)
        })
        .await
    }

    /// Single attempt; any failure is reported as `None`.
    async fn optional_json<T, F>(&self, operation: &str, request_builder: F) -> Option<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> reqwest::RequestBuilder,
    {
        let response = match request_builder().send().await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(%error, "github {operation} request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(status = response.status().as_u16(), "github {operation} failed");
            return None;
        }
        response.json::<T>().await.ok()
    }

    /// Sends a request and decodes the JSON response. Only `idempotent`
    /// requests are retried.
    async fn request_json<T, F>(
        &self,
        operation: &str,
        idempotent: bool,
        mut request_builder: F,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let max_attempts = if idempotent {
            self.retry_max_attempts
        } else {
            1
        };
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder().send().await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode github {operation}"))?;
                        return Ok(parsed);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let retryable =
                        is_retryable_github_response(status.as_u16(), response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < max_attempts && retryable {
                        tracing::debug!(
                            attempt,
                            status = status.as_u16(),
                            "retrying github {operation}"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "github api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }
}

#[async_trait]
impl CommentTransport for GithubApiClient {
    async fn create_comment(&self, issue_url: &str, body: &str) -> Result<String> {
        Ok(self.create_issue_comment(issue_url, body).await?.url)
    }

    async fn update_comment(&self, comment_url: &str, body: &str) -> Result<()> {
        self.update_issue_comment(comment_url, body).await?;
        Ok(())
    }
}
