use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

/// Action inputs are strings; only the literal `true` enables a switch.
fn parse_action_switch(value: &str) -> Result<bool, String> {
    Ok(value.trim() == "true")
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "github_pr_comment",
    about = "Maintains the plan comment on a GitHub pull request",
    version
)]
pub struct Cli {
    #[arg(
        long = "github-token",
        env = "TERRAFORM_ACTIONS_GITHUB_TOKEN",
        hide_env_values = true,
        help = "Token used for GitHub API requests"
    )]
    pub github_token: String,

    #[arg(
        long = "github-api-url",
        env = "GITHUB_API_URL",
        default_value = "https://api.github.com",
        help = "Base URL of the GitHub REST API"
    )]
    pub github_api_url: String,

    #[arg(
        long = "github-graphql-url",
        env = "GITHUB_GRAPHQL_URL",
        help = "GitHub GraphQL endpoint. Defaults to <github-api-url>/graphql"
    )]
    pub github_graphql_url: Option<String>,

    #[arg(
        long = "github-server-url",
        env = "GITHUB_SERVER_URL",
        default_value = "https://github.com",
        help = "Base URL used for links to workflow runs"
    )]
    pub github_server_url: String,

    #[arg(
        long,
        env = "GITHUB_REPOSITORY",
        default_value = "",
        help = "Repository in owner/repo form"
    )]
    pub repository: String,

    #[arg(
        long,
        env = "GITHUB_SHA",
        default_value = "",
        help = "Commit used to locate the pull request"
    )]
    pub sha: String,

    #[arg(long = "event-name", env = "GITHUB_EVENT_NAME", default_value = "")]
    pub event_name: String,

    #[arg(
        long = "event-path",
        env = "GITHUB_EVENT_PATH",
        help = "Path to the JSON payload of the triggering event"
    )]
    pub event_path: Option<PathBuf>,

    #[arg(long, env = "GITHUB_WORKFLOW", default_value = "")]
    pub workflow: String,

    #[arg(long = "run-number", env = "GITHUB_RUN_NUMBER", default_value = "")]
    pub run_number: String,

    #[arg(long = "run-id", env = "GITHUB_RUN_ID", default_value = "")]
    pub run_id: String,

    #[arg(
        long = "github-output",
        env = "GITHUB_OUTPUT",
        help = "File that receives step outputs such as failure-reason"
    )]
    pub github_output: Option<PathBuf>,

    #[arg(
        long = "plan-dir",
        env = "PLAN_OUT_DIR",
        help = "Directory containing one rendered plan file per module"
    )]
    pub plan_dir: Option<PathBuf>,

    #[arg(long, env = "STATUS", default_value = "", help = "Status line shown under the plans")]
    pub status: String,

    #[arg(long, env = "INPUT_LABEL", help = "Label distinguishing plans of the same path")]
    pub label: Option<String>,

    #[arg(
        long,
        env = "INPUT_PATH",
        default_value = ".",
        help = "Module path shown in the description"
    )]
    pub path: String,

    #[arg(
        long,
        env = "INPUT_DESTROY",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = parse_action_switch,
        help = "Set to true when the plan destroys all resources"
    )]
    pub destroy: bool,

    #[arg(long = "backend-config", env = "INPUT_BACKEND_CONFIG", default_value = "")]
    pub backend_config: String,

    #[arg(long = "tool-name", env = "TOOL_PRODUCT_NAME", default_value = "Terragrunt")]
    pub tool_name: String,

    #[arg(
        long = "job-cache-dir",
        env = "JOB_TMP_DIR",
        default_value = ".",
        help = "Cache root shared by every step of the job"
    )]
    pub job_cache_dir: PathBuf,

    #[arg(
        long = "step-cache-dir",
        env = "STEP_TMP_DIR",
        default_value = ".",
        help = "Cache root private to the current step"
    )]
    pub step_cache_dir: PathBuf,

    #[arg(
        long = "request-timeout-ms",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Timeout for each GitHub API request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        default_value_t = 4,
        value_parser = parse_positive_usize,
        help = "Attempts for idempotent GitHub API reads"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Base delay of the exponential retry backoff"
    )]
    pub retry_base_delay_ms: u64,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum CliCommand {
    /// Post or refresh the comment with the plans in --plan-dir and the current status.
    Plan,
    /// Replace the status line of an existing comment.
    Status,
    /// Write the rendered comment to a file.
    Get {
        /// Destination file.
        path: PathBuf,
    },
    /// Check that the plans in --plan-dir still match the plans on the pull request.
    Approved,
}
