//! Error types for wiz-kube

use thiserror::Error;

/// Result type for wiz-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors from driving kubectl and helm
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// `helm upgrade --install` exited non-zero
    #[error("release '{release}' failed ({status})\n{output}")]
    ReleaseFailed {
        release: String,
        status: String,
        output: String,
    },

    /// Some secrets could not be pushed; the others stay pushed
    #[error("failed to push {failed} of {total} secret(s): {names}")]
    PushFailed {
        failed: usize,
        total: usize,
        names: String,
    },

    /// Any other external command exited non-zero
    #[error("`{command}` failed ({status})\n{output}")]
    CommandFailed {
        command: String,
        status: String,
        output: String,
    },

    /// The tool could not be started
    #[error("failed to run {program}: {source}\nHint: check that it is installed and on PATH, or pass --kubectl / --helm")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Timeout
    #[error("`{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// Ctrl-C during an external command
    #[error("interrupted")]
    Interrupted,

    /// Object missing from the cluster
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Core(#[from] wiz_core::CoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a missing cluster object
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::NotFound { .. })
    }
}
