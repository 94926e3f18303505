//! Locates the pull request, its issue URL and the commenting user for the
//! current workflow run. Results are memoized in the job and step caches.

use std::path::PathBuf;

use anyhow::{Context, Result};
use planpost_cache::KeyValueCache;
use planpost_core::{fingerprint, sha256_hex};
use serde_json::Value;
use thiserror::Error;

use crate::github_api_client::GithubApiClient;

pub const STEP_CACHE_PR_URL_KEY: &str = "pr_url";
pub const DEFAULT_COMMENT_USER: &str = "github-actions[bot]";

/// The workflow run does not belong to a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct WorkflowError(pub String);

#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    pub event_name: String,
    pub event_path: Option<PathBuf>,
    pub repository: String,
    pub sha: String,
}

/// Pull request URL carried by the event payload itself, if any.
pub fn pr_url_from_event(
    event_name: &str,
    payload: &Value,
) -> Result<Option<String>, WorkflowError> {
    match event_name {
        "pull_request" | "pull_request_target" | "pull_request_review"
        | "pull_request_review_comment" => payload["pull_request"]["url"]
            .as_str()
            .map(|url| Some(url.to_string()))
            .ok_or_else(|| WorkflowError(format!("{event_name} event has no pull request url"))),
        "issue_comment" => payload["issue"]["pull_request"]["url"]
            .as_str()
            .map(|url| Some(url.to_string()))
            .ok_or_else(|| WorkflowError("Event was not a comment on a pull request".to_string())),
        _ => Ok(None),
    }
}

pub async fn find_pull_request(
    client: &GithubApiClient,
    context: &WorkflowContext,
) -> Result<String> {
    if let Some(event_path) = &context.event_path {
        let raw = std::fs::read_to_string(event_path)
            .with_context(|| format!("failed to read event payload {}", event_path.display()))?;
        let payload: Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse event payload {}", event_path.display()))?;
        if let Some(url) = pr_url_from_event(&context.event_name, &payload)? {
            return Ok(url);
        }
    }

    if context.repository.is_empty() || context.sha.is_empty() {
        return Err(WorkflowError(format!(
            "Could not find the PR for this {} event: repository and commit are unknown",
            context.event_name
        ))
        .into());
    }

    let pulls = client
        .commit_pull_requests(&context.repository, &context.sha)
        .await?;
    pulls
        .into_iter()
        .find(|pull| pull.state == "open")
        .map(|pull| pull.url)
        .ok_or_else(|| {
            WorkflowError(format!(
                "No open PR found in {} for commit {} (was it pushed directly to the target branch?)",
                context.repository, context.sha
            ))
            .into()
        })
}

pub async fn cached_pull_request(
    client: &GithubApiClient,
    step_cache: &dyn KeyValueCache,
    context: &WorkflowContext,
) -> Result<String> {
    if let Some(pr_url) = step_cache.get(STEP_CACHE_PR_URL_KEY)? {
        return Ok(pr_url);
    }
    let pr_url = find_pull_request(client, context).await?;
    step_cache.set(STEP_CACHE_PR_URL_KEY, &pr_url)?;
    Ok(pr_url)
}

pub async fn cached_issue_url(
    client: &GithubApiClient,
    job_cache: &dyn KeyValueCache,
    pr_url: &str,
) -> Result<String> {
    let cache_key = format!("issue-url/{}", sha256_hex(pr_url.as_bytes()));
    if let Some(issue_url) = job_cache.get(&cache_key)? {
        return Ok(issue_url);
    }
    let issue_url = client.pull_request_issue_url(pr_url).await?;
    job_cache.set(&cache_key, &issue_url)?;
    Ok(issue_url)
}

pub async fn cached_current_user(
    client: &GithubApiClient,
    job_cache: &dyn KeyValueCache,
    token: &str,
) -> Result<String> {
    let cache_key = format!("token-cache/{}", fingerprint(token, ""));
    if let Some(username) = job_cache.get(&cache_key)? {
        tracing::debug!(%username, "token username from cache");
        return Ok(username);
    }
    let username = match client.viewer_login().await {
        Some(login) => login,
        None => {
            tracing::debug!("unable to get username for the github token");
            DEFAULT_COMMENT_USER.to_string()
        }
    };
    job_cache.set(&cache_key, &username)?;
    tracing::debug!(%username, "token username");
    Ok(username)
}
