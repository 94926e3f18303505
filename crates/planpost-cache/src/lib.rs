//! Job- and step-scoped key-value memoization.
//!
//! Each invocation of the comment tool is a separate process, so values such
//! as the resolved pull request or the matched comment are kept in a
//! directory owned by the current job or step. Last write wins.

pub mod entry_io;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};

pub use entry_io::write_cache_entry;

pub trait KeyValueCache {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Stores each key as a file below `<base>/<name>`; `/` in a key nests
/// directories.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    root: PathBuf,
}

impl DirectoryCache {
    pub fn new(base: &Path, name: &str) -> Self {
        Self {
            root: base.join(name),
        }
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                bail!("invalid cache key '{key}'");
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl KeyValueCache for DirectoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.entry_path(key)?;
        if !path.is_file() {
            return Ok(None);
        }
        let value = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read cache entry {}", path.display()))?;
        tracing::debug!(key, cache = %self.root.display(), "cache hit");
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        write_cache_entry(&path, value)
    }
}

/// Process-local cache used when nothing should outlive the invocation.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, String>>,
}

impl KeyValueCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock is poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory cache lock is poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
