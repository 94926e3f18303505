//! The `github_pr_comment` driver used by the plan and apply actions.

pub mod actions_output;
pub mod bootstrap_helpers;
pub mod cli_args;
pub mod commands;

pub use actions_output::set_output;
pub use bootstrap_helpers::init_tracing;
pub use cli_args::{Cli, CliCommand};
pub use commands::{run_cli, run_command, CommandOutcome};
