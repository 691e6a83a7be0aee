//! Secret file collection from `secretfiles/`
//!
//! Every regular file below `secretfiles/` becomes a [`SecretFile`] whose
//! logical key is its `/`-separated path relative to that directory. Files are
//! grouped by parent directory: one group is pushed as one mount secret.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::envdir::EnvDir;
use crate::error::{CoreError, Result};

/// Group name for files directly under `secretfiles/`
pub const ROOT_GROUP: &str = "";

/// A file to be pushed as (part of) a cluster secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFile {
    /// Relative path with `/` separators, e.g. `certs/tls.crt`
    pub key: String,
    /// Path on disk
    pub path: PathBuf,
    /// Raw content, never transformed
    pub content: Vec<u8>,
}

impl SecretFile {
    /// Parent directory of the key (`""` for top-level files)
    pub fn group(&self) -> &str {
        self.key
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or(ROOT_GROUP)
    }

    /// File name, used as the data key inside the mount secret
    pub fn file_name(&self) -> &str {
        self.key
            .rsplit_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.key)
    }
}

/// All secret files of an environment directory, sorted by key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretFiles {
    entries: Vec<SecretFile>,
}

impl SecretFiles {
    /// Collect `secretfiles/` of an environment directory
    pub fn collect(dir: &EnvDir) -> Result<Self> {
        Self::collect_from(&dir.secret_files_path())
    }

    /// Collect every regular file below `root`; a missing root yields nothing
    pub fn collect_from(root: &Path) -> Result<Self> {
        if !root.exists() {
            return Ok(Self::default());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                let message = if e.loop_ancestor().is_some() {
                    "symlink cycle".to_string()
                } else {
                    e.to_string()
                };
                CoreError::SecretRead { path, message }
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let key = logical_key(root, path)?;
            let content = std::fs::read(path).map_err(|e| CoreError::SecretRead {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            entries.push(SecretFile {
                key,
                path: path.to_path_buf(),
                content,
            });
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        tracing::debug!(count = entries.len(), root = %root.display(), "collected secret files");
        Ok(Self { entries })
    }

    pub fn from_entries(mut entries: Vec<SecretFile>) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&SecretFile> {
        self.entries
            .binary_search_by(|e| e.key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecretFile> {
        self.entries.iter()
    }

    /// Files bucketed by parent directory
    pub fn groups(&self) -> BTreeMap<&str, Vec<&SecretFile>> {
        let mut groups: BTreeMap<&str, Vec<&SecretFile>> = BTreeMap::new();
        for entry in &self.entries {
            groups.entry(entry.group()).or_default().push(entry);
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn logical_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| CoreError::SecretRead {
        path: path.display().to_string(),
        message: "path is outside secretfiles/".to_string(),
    })?;

    let parts = relative
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| CoreError::SecretRead {
                path: path.display().to_string(),
                message: "file name is not valid UTF-8".to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(parts.join("/"))
}
