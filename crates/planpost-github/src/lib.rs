//! GitHub transport for the pull-request plan comment.
//!
//! Wraps the REST and GraphQL calls needed to find the pull request for a
//! workflow run, list its comments and create or patch the plan comment.

pub mod comment_sync;
pub mod github_api_client;
pub mod pull_request;
pub mod transport_helpers;

pub use comment_sync::{find_pr_comment, update_comment, CommentQuery, COMMENT_FORMAT_VERSION};
pub use github_api_client::{
    CommentTransport, GithubApiClient, GithubClientConfig, GithubIssueComment, GithubUser,
};
pub use pull_request::{
    cached_current_user, cached_issue_url, cached_pull_request, WorkflowContext, WorkflowError,
};
