use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Replaces a cache entry in one rename. The value is staged next to the
/// entry first so that a reader in another step sees the old value or the new
/// one, never a prefix.
pub fn write_cache_entry(entry: &Path, value: &str) -> Result<()> {
    let Some(file_name) = entry.file_name() else {
        bail!("cache entry '{}' has no file name", entry.display());
    };
    if entry.is_dir() {
        bail!("cache entry '{}' is a directory", entry.display());
    }
    if let Some(dir) = entry.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create cache directory {}", dir.display()))?;
    }

    let staged = staging_path(entry, file_name);
    std::fs::write(&staged, value)
        .with_context(|| format!("failed to stage cache entry {}", staged.display()))?;
    if let Err(error) = std::fs::rename(&staged, entry) {
        let _ = std::fs::remove_file(&staged);
        return Err(error)
            .with_context(|| format!("failed to replace cache entry {}", entry.display()));
    }
    Ok(())
}

fn staging_path(entry: &Path, file_name: &std::ffi::OsStr) -> PathBuf {
    let mut staged = OsString::from(".");
    staged.push(file_name);
    staged.push(format!(
        ".staged-{}-{}",
        std::process::id(),
        STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    entry.with_file_name(staged)
}
