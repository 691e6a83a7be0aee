//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Config not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Invalid wiz.yml at `{field}`: {message}")]
    SpecParse { field: String, message: String },

    #[error("Failed to read secret file {path}: {message}")]
    SecretRead { path: String, message: String },

    #[error("Binding `{binding}` references environment variable {name}, which is not set in .env")]
    MissingEnvVar { name: String, binding: String },

    #[error("Binding `{binding}` references secret file {key}, which is not under secretfiles/")]
    MissingSecretFile { key: String, binding: String },

    #[error("Value paths `{first}` and `{second}` overlap")]
    ValuePathConflict { first: String, second: String },

    #[error("Secret name {name} is derived from both `{first}` and `{second}`")]
    SecretNameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("Invalid .env line {line} in {path}: {message}")]
    EnvParse {
        path: String,
        line: usize,
        message: String,
    },

    #[error("Failed to serialize values: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn spec(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SpecParse {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
