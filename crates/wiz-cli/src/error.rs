//! CLI error types with exit code handling
//!
//! Every failure is mapped onto one of the stable codes in
//! [`exit_codes`](crate::exit_codes).

use miette::Diagnostic;
use thiserror::Error;
use wiz_core::CoreError;
use wiz_kube::KubeError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Missing or invalid configuration
    #[error("{message}")]
    #[diagnostic(code(wizk8s::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A binding points at something that does not exist
    #[error("{message}")]
    #[diagnostic(code(wizk8s::missing_reference))]
    MissingReference {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// kubectl or helm failed
    #[error("{message}")]
    #[diagnostic(code(wizk8s::external))]
    External {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(wizk8s::io))]
    Io { message: String },

    /// Invalid invocation
    #[error("{message}")]
    #[diagnostic(code(wizk8s::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Interrupted")]
    #[diagnostic(code(wizk8s::interrupted))]
    Interrupted,

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(wizk8s::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::MissingReference { .. } => exit_codes::MISSING_REFERENCE,
            CliError::External { .. } => exit_codes::EXTERNAL_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Interrupted => exit_codes::INTERRUPTED,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a config error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ConfigNotFound { .. } => CliError::Config {
                message,
                help: Some("Run `wizk8s setup` or pass --dirpath".to_string()),
            },
            CoreError::SpecParse { .. }
            | CoreError::SecretRead { .. }
            | CoreError::EnvParse { .. }
            | CoreError::SecretNameCollision { .. } => CliError::Config {
                message,
                help: None,
            },
            CoreError::MissingEnvVar { name, .. } => CliError::MissingReference {
                message,
                help: Some(format!("Add {}=... to .env or run `wizk8s setup`", name)),
            },
            CoreError::MissingSecretFile { .. } => CliError::MissingReference {
                message,
                help: Some("Secret file keys are paths relative to secretfiles/".to_string()),
            },
            CoreError::ValuePathConflict { .. } => CliError::MissingReference {
                message,
                help: Some("A value path cannot also be the parent of another one".to_string()),
            },
            CoreError::Serialize(_) => CliError::Internal { message },
            CoreError::Io(_) => CliError::Io { message },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Interrupted => CliError::Interrupted,
            KubeError::Core(core) => core.into(),
            KubeError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            KubeError::NotFound { .. } => CliError::External {
                message: err.to_string(),
                help: Some("Check --namespace and --context".to_string()),
            },
            other => CliError::External {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_exit_codes() {
        let cases = [
            (
                CoreError::ConfigNotFound { path: "wiz.yml".into() },
                exit_codes::CONFIG_ERROR,
            ),
            (
                CoreError::MissingEnvVar {
                    name: "FOO".into(),
                    binding: "a".into(),
                },
                exit_codes::MISSING_REFERENCE,
            ),
            (
                CoreError::ValuePathConflict {
                    first: "a.b".into(),
                    second: "a.b.c".into(),
                },
                exit_codes::MISSING_REFERENCE,
            ),
            (
                CoreError::EnvParse {
                    path: ".env".into(),
                    line: 1,
                    message: "bad".into(),
                },
                exit_codes::CONFIG_ERROR,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(CliError::from(err).exit_code(), code);
        }
    }

    #[test]
    fn test_kube_exit_codes() {
        assert_eq!(
            CliError::from(KubeError::Interrupted).exit_code(),
            exit_codes::INTERRUPTED
        );
        let failed = KubeError::ReleaseFailed {
            release: "app".into(),
            status: "exit status 1".into(),
            output: "boom".into(),
        };
        let err = CliError::from(failed);
        assert_eq!(err.exit_code(), exit_codes::EXTERNAL_ERROR);
        assert!(err.to_string().contains("boom"));

        let wrapped = KubeError::Core(CoreError::MissingSecretFile {
            key: "k".into(),
            binding: "b".into(),
        });
        assert_eq!(
            CliError::from(wrapped).exit_code(),
            exit_codes::MISSING_REFERENCE
        );
    }

    #[test]
    fn test_missing_env_help_names_variable() {
        let err = CliError::from(CoreError::MissingEnvVar {
            name: "REGION".into(),
            binding: "global.region".into(),
        });
        match err {
            CliError::MissingReference { message, help } => {
                assert!(message.contains("REGION"));
                assert!(help.unwrap().contains("REGION="));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
