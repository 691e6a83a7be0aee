//! Environment directory layout
//!
//! An environment directory holds everything needed to deploy one environment
//! of a chart:
//!
//! ```text
//! helm/staging-3/
//! ├── wiz.yml          # deployment spec
//! ├── .env             # KEY=value lines
//! └── secretfiles/     # files pushed as mount secrets
//!     └── certs/tls.crt
//! ```
//!
//! The resolved directory is passed explicitly to every loader; nothing here
//! reads the process working directory except [`EnvDir::discover`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CoreError, Result};

/// Deployment spec file name
pub const SPEC_FILE: &str = "wiz.yml";

/// Accepted alternative spec file name
pub const SPEC_FILE_ALT: &str = "wiz.yaml";

/// Environment variables file name
pub const ENV_FILE: &str = ".env";

/// Secret files directory name
pub const SECRET_FILES_DIR: &str = "secretfiles";

/// Helm chart metadata file name
pub const CHART_FILE: &str = "Chart.yaml";

/// A resolved environment directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvDir {
    root: PathBuf,
}

impl EnvDir {
    /// Wrap a path without checking it
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open an existing environment directory
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CoreError::ConfigNotFound {
                path: root.display().to_string(),
            });
        }
        Ok(Self { root })
    }

    /// Use `cwd` as the environment directory if it contains a spec file
    pub fn discover(cwd: &Path) -> Option<Self> {
        let dir = Self::new(cwd);
        dir.has_spec().then_some(dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the spec file, preferring `wiz.yml` over `wiz.yaml`
    pub fn spec_path(&self) -> PathBuf {
        let primary = self.root.join(SPEC_FILE);
        if primary.exists() {
            return primary;
        }
        let alt = self.root.join(SPEC_FILE_ALT);
        if alt.exists() { alt } else { primary }
    }

    pub fn has_spec(&self) -> bool {
        self.spec_path().is_file()
    }

    pub fn env_path(&self) -> PathBuf {
        self.root.join(ENV_FILE)
    }

    pub fn secret_files_path(&self) -> PathBuf {
        self.root.join(SECRET_FILES_DIR)
    }

    /// Directory name, used as the default environment name
    pub fn name(&self) -> String {
        let resolved = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string())
    }

    /// Nearest ancestor (excluding the directory itself) containing `Chart.yaml`
    pub fn find_chart_dir(&self) -> Option<PathBuf> {
        let resolved = self.root.canonicalize().ok()?;
        resolved
            .ancestors()
            .skip(1)
            .find(|dir| dir.join(CHART_FILE).is_file())
            .map(Path::to_path_buf)
    }
}

#[derive(Debug, Deserialize)]
struct ChartMetadata {
    name: String,
}

/// Read the chart name from `<chart_dir>/Chart.yaml`
pub fn chart_name(chart_dir: &Path) -> Result<String> {
    let path = chart_dir.join(CHART_FILE);
    let content = std::fs::read_to_string(&path).map_err(|_| CoreError::ConfigNotFound {
        path: path.display().to_string(),
    })?;
    let chart: ChartMetadata = serde_yaml::from_str(&content)
        .map_err(|e| CoreError::spec(CHART_FILE, e.to_string()))?;
    Ok(chart.name)
}
