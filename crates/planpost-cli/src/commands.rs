//! Subcommand driver: resolves the pull request comment for this plan, then
//! posts, patches, exports or approves it.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use planpost_cache::{DirectoryCache, KeyValueCache};
use planpost_core::comment_header::keys;
use planpost_core::plan_description::{JobRef, PlanIdentity};
use planpost_core::plan_sections::{build_sections, plan_hash_records, read_plan_files};
use planpost_core::{
    evaluate_approval, render_comment_body, ApprovalError, ApprovalOutcome, Comment,
    CommentUpdate,
};
use planpost_github::{
    cached_current_user, cached_issue_url, cached_pull_request, find_pr_comment, update_comment,
    CommentQuery, GithubApiClient, GithubClientConfig, WorkflowContext, WorkflowError,
};
use serde_json::Value;

use crate::actions_output::set_output;
use crate::cli_args::{Cli, CliCommand};

pub const CACHE_DIR_NAME: &str = "github_pr_comment";
pub const STEP_CACHE_COMMENT_KEY: &str = "comment";
pub const FAILURE_REASON_OUTPUT: &str = "failure-reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Failure,
}

impl CommandOutcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Failure => ExitCode::FAILURE,
        }
    }
}

pub async fn run_cli(cli: Cli) -> Result<CommandOutcome> {
    let client = GithubApiClient::new(client_config(&cli))?;
    let job_cache = DirectoryCache::new(&cli.job_cache_dir, CACHE_DIR_NAME);
    let step_cache = DirectoryCache::new(&cli.step_cache_dir, CACHE_DIR_NAME);
    run_command(&cli, &client, &job_cache, &step_cache).await
}

pub fn client_config(cli: &Cli) -> GithubClientConfig {
    GithubClientConfig {
        api_base: cli.github_api_url.clone(),
        graphql_url: cli.github_graphql_url.clone(),
        token: cli.github_token.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    }
}

pub fn plan_identity(cli: &Cli) -> PlanIdentity {
    PlanIdentity {
        tool_name: cli.tool_name.clone(),
        label: cli.label.clone(),
        path: cli.path.clone(),
        destroy: cli.destroy,
        backend_config: cli.backend_config.clone(),
    }
}

pub fn job_ref(cli: &Cli) -> JobRef {
    JobRef {
        workflow: cli.workflow.clone(),
        run_number: cli.run_number.clone(),
        server_url: cli.github_server_url.clone(),
        repository: cli.repository.clone(),
        run_id: cli.run_id.clone(),
    }
}

fn workflow_context(cli: &Cli) -> WorkflowContext {
    WorkflowContext {
        event_name: cli.event_name.clone(),
        event_path: cli.event_path.clone(),
        repository: cli.repository.clone(),
        sha: cli.sha.clone(),
    }
}

pub async fn run_command(
    cli: &Cli,
    client: &GithubApiClient,
    job_cache: &dyn KeyValueCache,
    step_cache: &dyn KeyValueCache,
) -> Result<CommandOutcome> {
    tracing::debug!(command = ?cli.command, "running command");
    let comment = match resolve_comment(cli, client, job_cache, step_cache).await {
        Ok(comment) => comment,
        Err(error) => {
            return match error.downcast_ref::<WorkflowError>() {
                Some(workflow_error) => {
                    eprintln!("\n{workflow_error}");
                    Ok(CommandOutcome::Failure)
                }
                None => Err(error),
            };
        }
    };

    let comment = match &cli.command {
        CliCommand::Plan => post_plan(cli, client, &comment).await?,
        CliCommand::Status => {
            if comment.comment_url().is_none() {
                eprintln!("Can't set status of comment that doesn't exist");
                return Ok(CommandOutcome::Failure);
            }
            update_comment(
                client,
                &comment,
                CommentUpdate {
                    status: Some(cli.status.clone()),
                    ..CommentUpdate::default()
                },
            )
            .await?
        }
        CliCommand::Get { path } => {
            if comment.comment_url().is_none() {
                eprintln!("Can't get the plan from comment that doesn't exist");
                return Ok(CommandOutcome::Failure);
            }
            std::fs::write(path, render_comment_body(&comment))
                .with_context(|| format!("failed to write {}", path.display()))?;
            comment
        }
        CliCommand::Approved => return check_approval(cli, client, step_cache, comment).await,
    };

    save_comment(step_cache, &comment)?;
    Ok(CommandOutcome::Success)
}

async fn resolve_comment(
    cli: &Cli,
    client: &GithubApiClient,
    job_cache: &dyn KeyValueCache,
    step_cache: &dyn KeyValueCache,
) -> Result<Comment> {
    if let Some(serialized) = step_cache.get(STEP_CACHE_COMMENT_KEY)? {
        tracing::debug!("comment from step cache");
        return serde_json::from_str(&serialized).context("failed to parse cached comment");
    }

    let pr_url = cached_pull_request(client, step_cache, &workflow_context(cli)).await?;
    let issue_url = cached_issue_url(client, job_cache, &pr_url).await?;
    let username = cached_current_user(client, job_cache, &cli.github_token).await?;

    let identity = plan_identity(cli);
    let headers = identity.required_headers();
    let backup_headers = headers.clone();
    let legacy_description = identity.legacy_description();
    tracing::debug!(?headers, %issue_url, "looking for existing comment");

    find_pr_comment(
        client,
        CommentQuery {
            issue_url: &issue_url,
            username: &username,
            headers: &headers,
            backup_headers: &backup_headers,
            legacy_description: &legacy_description,
        },
    )
    .await
}

fn save_comment(step_cache: &dyn KeyValueCache, comment: &Comment) -> Result<()> {
    let serialized = serde_json::to_string(comment).context("failed to serialize comment")?;
    step_cache.set(STEP_CACHE_COMMENT_KEY, &serialized)
}

fn plan_dir(cli: &Cli) -> Result<&Path> {
    cli.plan_dir
        .as_deref()
        .context("plan directory is not set (PLAN_OUT_DIR)")
}

async fn post_plan(cli: &Cli, client: &GithubApiClient, comment: &Comment) -> Result<Comment> {
    let files = read_plan_files(plan_dir(cli)?)?;
    let plan_sections = build_sections(&files);

    let mut headers = comment.headers().clone();
    headers.insert(
        keys::PLAN_JOB_REF.to_string(),
        Value::String(job_ref(cli).workflow_ref()),
    );
    headers.insert(
        keys::PLAN_HASHES.to_string(),
        serde_json::to_value(plan_hash_records(&files, comment.issue_url()))
            .context("failed to encode plan hashes")?,
    );
    if plan_sections.truncated {
        headers.insert(keys::TRUNCATED.to_string(), Value::Bool(true));
    } else {
        headers.remove(keys::TRUNCATED);
    }

    update_comment(
        client,
        comment,
        CommentUpdate {
            headers: Some(headers),
            description: Some(plan_identity(cli).description()),
            sections: Some(plan_sections.sections),
            status: Some(cli.status.clone()),
        },
    )
    .await
}

async fn check_approval(
    cli: &Cli,
    client: &GithubApiClient,
    step_cache: &dyn KeyValueCache,
    comment: Comment,
) -> Result<CommandOutcome> {
    let outcome = match evaluate_approval(plan_dir(cli)?, &comment) {
        Ok(outcome) => outcome,
        Err(error @ ApprovalError::NoExistingComment) => {
            println!("Plan not found on PR");
            println!(
                "Generate the plan first using the plan action. Alternatively set the auto_approve input to 'true'"
            );
            report_failure(cli, &error)?;
            return Ok(CommandOutcome::Failure);
        }
        Err(error @ ApprovalError::PlanCountChanged { .. }) => {
            tracing::debug!(%error, "plan count changed");
            println!("The number of plans in PR doesn't match the current number of plans.");
            println!("Regenerate the plan first using the plan action.");
            report_failure(cli, &error)?;
            return Ok(CommandOutcome::Failure);
        }
        Err(error) => return Err(error.into()),
    };

    match outcome {
        ApprovalOutcome::Approved => {
            save_comment(step_cache, &comment)?;
            Ok(CommandOutcome::Success)
        }
        ApprovalOutcome::PlanChanged { changed } => {
            tracing::info!(?changed, "plan changed since it was posted");
            println!("Not applying the plan - it has changed from the plan on the PR");
            println!(
                "The plan on the PR must be up to date. Alternatively, set the auto_approve input to 'true' to apply outdated plans"
            );
            set_output(
                cli.github_output.as_deref(),
                FAILURE_REASON_OUTPUT,
                planpost_core::approval::FAILURE_REASON_PLAN_CHANGED,
            )?;
            let comment = update_comment(
                client,
                &comment,
                CommentUpdate {
                    status: Some(format!(
                        ":x: Plan not applied in {} (Plan has changed)",
                        job_ref(cli).markdown_ref()
                    )),
                    ..CommentUpdate::default()
                },
            )
            .await?;
            save_comment(step_cache, &comment)?;
            Ok(CommandOutcome::Failure)
        }
    }
}

fn report_failure(cli: &Cli, error: &ApprovalError) -> Result<()> {
    match error.failure_reason() {
        Some(reason) => set_output(cli.github_output.as_deref(), FAILURE_REASON_OUTPUT, reason),
        None => Ok(()),
    }
}
