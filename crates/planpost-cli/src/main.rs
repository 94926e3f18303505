use std::process::ExitCode;

use clap::Parser;
use planpost_cli::{init_tracing, run_cli, Cli, CommandOutcome};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run_cli(cli).await {
        Ok(outcome) => outcome.exit_code(),
        Err(error) => {
            eprintln!("{error:#}");
            CommandOutcome::Failure.exit_code()
        }
    }
}
