// pgswap/src/storage/local.rs
use std::fs;
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{AppError, Result};
use crate::utils::shell_quote;

/// Dumps stored as files under a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStorage { root: root.into() }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Relative paths of every file under the root that start with `prefix`.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if !self.root.exists() {
            debug!("Storage directory {} does not exist yet", self.root.display());
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| {
                AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    pub fn read_fragment(&self, key: &str) -> String {
        format!("cat {} |", shell_quote(&self.path(key).to_string_lossy()))
    }

    /// Creates the parent directories of `key` and returns the redirect into it.
    pub fn write_fragment(&self, key: &str) -> Result<String> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Configuration(format!(
                    "Failed to create storage directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(format!("> {}", shell_quote(&path.to_string_lossy())))
    }
}
