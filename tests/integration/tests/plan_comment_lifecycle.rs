use std::fs;
use std::path::{Path, PathBuf};

use httpmock::prelude::*;
use planpost_cache::{DirectoryCache, KeyValueCache};
use planpost_cli::commands::{client_config, CACHE_DIR_NAME, STEP_CACHE_COMMENT_KEY};
use planpost_cli::{run_command, Cli, CliCommand, CommandOutcome};
use planpost_core::{parse_comment_body, render_comment_body, Comment};
use planpost_github::GithubApiClient;
use serde_json::json;

const BOT_LOGIN: &str = "github-actions[bot]";

struct ActionJob {
    root: tempfile::TempDir,
    server: MockServer,
}

impl ActionJob {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(root.path().join("plans")).expect("plans dir");
        Self {
            root,
            server: MockServer::start(),
        }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn write_plan(&self, name: &str, text: &str) {
        fs::write(self.path().join("plans").join(name), text).expect("write plan");
    }

    fn write_event(&self) -> PathBuf {
        let event_path = self.path().join("event.json");
        fs::write(
            &event_path,
            json!({"pull_request": {"url": self.server.url("/repos/o/r/pulls/3")}}).to_string(),
        )
        .expect("write event");
        event_path
    }

    fn cli(&self, step: &str, command: CliCommand) -> Cli {
        Cli {
            github_token: "ghs_token".to_string(),
            github_api_url: self.server.base_url(),
            github_graphql_url: None,
            github_server_url: "https://github.com".to_string(),
            repository: "o/r".to_string(),
            sha: "abc123".to_string(),
            event_name: "pull_request".to_string(),
            event_path: Some(self.write_event()),
            workflow: "Deploy".to_string(),
            run_number: "12".to_string(),
            run_id: "4242".to_string(),
            github_output: Some(self.path().join(format!("{step}.output"))),
            plan_dir: Some(self.path().join("plans")),
            status: ":memo: Plan generated in Deploy #12".to_string(),
            label: None,
            path: "/infra".to_string(),
            destroy: false,
            backend_config: String::new(),
            tool_name: "Terragrunt".to_string(),
            job_cache_dir: self.path().join("job"),
            step_cache_dir: self.path().join(step),
            request_timeout_ms: 5_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
            command,
        }
    }

    async fn run(&self, step: &str, command: CliCommand) -> CommandOutcome {
        let cli = self.cli(step, command);
        let client = github_client(&cli);
        let job_cache = DirectoryCache::new(&cli.job_cache_dir, CACHE_DIR_NAME);
        let step_cache = DirectoryCache::new(&cli.step_cache_dir, CACHE_DIR_NAME);
        run_command(&cli, &client, &job_cache, &step_cache)
            .await
            .expect("command should not error")
    }

    fn cached_comment(&self, step: &str) -> Comment {
        let step_cache = DirectoryCache::new(&self.path().join(step), CACHE_DIR_NAME);
        let raw = step_cache
            .get(STEP_CACHE_COMMENT_KEY)
            .expect("read step cache")
            .expect("comment cached");
        serde_json::from_str(&raw).expect("parse cached comment")
    }

    fn output(&self, step: &str) -> String {
        fs::read_to_string(self.path().join(format!("{step}.output"))).unwrap_or_default()
    }
}

fn github_client(cli: &Cli) -> GithubApiClient {
    GithubApiClient::new(client_config(cli)).expect("client")
}

#[tokio::test]
async fn integration_plan_then_approve_then_detect_changed_plan() {
    let job = ActionJob::new();
    job.write_plan("infra___dns", "Plan: 1 to add, 0 to change, 0 to destroy.\n");
    job.write_plan("infra___vpc", "No changes. Your infrastructure matches the configuration.\n");

    let comment_url = job.server.url("/repos/o/r/issues/comments/11");
    let issue_url = job.server.url("/repos/o/r/issues/3");
    let pull = job.server.mock(|when, then| {
        when.method(GET).path("/repos/o/r/pulls/3");
        then.status(200)
            .json_body(json!({"_links": {"issue": {"href": issue_url}}}));
    });
    let viewer = job.server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(json!({"data": {"viewer": {"login": BOT_LOGIN}}}));
    });
    let mut listing = job.server.mock(|when, then| {
        when.method(GET).path("/repos/o/r/issues/3/comments");
        then.status(200).json_body(json!([]));
    });
    let create = job.server.mock(|when, then| {
        when.method(POST).path("/repos/o/r/issues/3/comments");
        then.status(201).json_body(json!({"url": comment_url}));
    });

    assert_eq!(job.run("plan-step", CliCommand::Plan).await, CommandOutcome::Success);
    create.assert_calls(1);

    let posted = job.cached_comment("plan-step");
    assert_eq!(posted.comment_url(), Some(comment_url.as_str()));
    assert_eq!(posted.description(), "Terragrunt plan in __/infra__");
    assert_eq!(posted.sections().len(), 2);
    assert_eq!(
        posted.sections()[0].summary.as_deref(),
        Some("infra/dns: Plan: 1 to add, 0 to change, 0 to destroy.")
    );
    assert_eq!(posted.headers()["plan_hashes"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        posted.headers()["plan_job_ref"],
        json!("Job Deploy #12 at https://github.com/o/r/actions/runs/4242")
    );
    assert_eq!(posted.headers()["version"], json!(env!("CARGO_PKG_VERSION")));

    let body = render_comment_body(&posted);
    let reparsed = parse_comment_body(&issue_url, &comment_url, &body).expect("parse posted body");
    assert_eq!(reparsed.headers(), posted.headers());

    listing.delete();
    let _listing = job.server.mock(|when, then| {
        when.method(GET).path("/repos/o/r/issues/3/comments");
        then.status(200).json_body(json!([
            {
                "url": job.server.url("/repos/o/r/issues/comments/10"),
                "issue_url": issue_url,
                "body": "Terragrunt plan in __/infra__ from someone else",
                "user": {"login": "octocat"}
            },
            {
                "url": comment_url,
                "issue_url": issue_url,
                "body": body,
                "user": {"login": BOT_LOGIN}
            }
        ]));
    });

    assert_eq!(
        job.run("apply-step", CliCommand::Approved).await,
        CommandOutcome::Success
    );
    assert_eq!(job.output("apply-step"), "");
    assert_eq!(
        job.cached_comment("apply-step").comment_url(),
        Some(comment_url.as_str())
    );

    let patch = job.server.mock(|when, then| {
        when.method(PATCH).path("/repos/o/r/issues/comments/11");
        then.status(200).json_body(json!({"url": comment_url}));
    });
    job.write_plan("infra___vpc", "Plan: 3 to add, 0 to change, 0 to destroy.\n");

    assert_eq!(
        job.run("reapply-step", CliCommand::Approved).await,
        CommandOutcome::Failure
    );
    assert_eq!(job.output("reapply-step"), "failure-reason=plan-changed\n");
    patch.assert_calls(1);
    let rejected = job.cached_comment("reapply-step");
    assert_eq!(
        rejected.status(),
        ":x: Plan not applied in [Deploy #12](https://github.com/o/r/actions/runs/4242) (Plan has changed)"
    );
    assert_eq!(rejected.sections(), posted.sections());

    pull.assert_calls(1);
    viewer.assert_calls(1);
}

#[tokio::test]
async fn integration_approved_rejects_added_plan_file() {
    let job = ActionJob::new();
    job.write_plan("infra", "No changes.\n");
    let comment_url = job.server.url("/repos/o/r/issues/comments/11");
    let issue_url = job.server.url("/repos/o/r/issues/3");
    job.server.mock(|when, then| {
        when.method(GET).path("/repos/o/r/pulls/3");
        then.status(200)
            .json_body(json!({"_links": {"issue": {"href": issue_url}}}));
    });
    job.server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(json!({"data": {"viewer": {"login": BOT_LOGIN}}}));
    });
    job.server.mock(|when, then| {
        when.method(GET).path("/repos/o/r/issues/3/comments");
        then.status(200).json_body(json!([]));
    });
    job.server.mock(|when, then| {
        when.method(POST).path("/repos/o/r/issues/3/comments");
        then.status(201).json_body(json!({"url": comment_url}));
    });
    assert_eq!(job.run("plan-step", CliCommand::Plan).await, CommandOutcome::Success);

    job.write_plan("infra___extra", "Plan: 1 to add.\n");
    // Same step: the cached comment is reused without listing comments again.
    assert_eq!(
        job.run("plan-step", CliCommand::Approved).await,
        CommandOutcome::Failure
    );
    assert_eq!(
        job.output("plan-step"),
        "failure-reason=number-of-plans-changed\n"
    );
}
