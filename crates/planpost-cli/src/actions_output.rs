use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Records a step output, appending to the `GITHUB_OUTPUT` file when the
/// runner provides one and printing the legacy workflow command otherwise.
pub fn set_output(output_file: Option<&Path>, name: &str, value: &str) -> Result<()> {
    match output_file {
        Some(path) => {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            writeln!(file, "{name}={value}")
                .with_context(|| format!("failed to append {}", path.display()))?;
            file.flush()
                .with_context(|| format!("failed to flush {}", path.display()))?;
        }
        None => println!("::set-output name={name}::{value}"),
    }
    tracing::debug!(name, value, "step output set");
    Ok(())
}
