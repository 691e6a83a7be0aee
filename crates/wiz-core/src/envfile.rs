//! `.env` file loading
//!
//! Format, one assignment per line:
//!
//! ```text
//! # comment
//! REGION=us-east
//! export API_URL="https://api.example.com"
//! GREETING='hello world'
//! ```
//!
//! There is no interpolation and no escaping; one layer of matching quotes is
//! stripped from the value. When a key repeats, the last assignment wins.

use indexmap::IndexMap;
use std::fs;
use std::path::Path;

use crate::envdir::EnvDir;
use crate::error::{CoreError, Result};

/// Variables read from a `.env` file, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars(IndexMap<String, String>);

impl EnvVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.env` from an environment directory
    ///
    /// A missing file is an error only when `required` is set; otherwise it
    /// yields an empty set.
    pub fn load(dir: &EnvDir, required: bool) -> Result<Self> {
        let path = dir.env_path();
        if !path.exists() {
            if required {
                return Err(CoreError::ConfigNotFound {
                    path: path.display().to_string(),
                });
            }
            return Ok(Self::new());
        }
        Self::from_file(&path)
    }

    /// Parse an arbitrary dotenv file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse dotenv content; `origin` is only used in error messages
    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let mut vars = IndexMap::new();

        for (idx, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line
                .strip_prefix("export ")
                .map(str::trim_start)
                .unwrap_or(line);

            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!(line = idx + 1, origin, "skipping .env line without '='");
                continue;
            };

            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(CoreError::EnvParse {
                    path: origin.to_string(),
                    line: idx + 1,
                    message: format!("invalid variable name '{}'", key),
                });
            }

            vars.insert(key.to_string(), unquote(value.trim()).to_string());
        }

        Ok(Self(vars))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Strip one layer of matching single or double quotes
fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Format a single assignment so that [`EnvVars::parse`] reads it back
pub fn format_line(name: &str, value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.contains(char::is_whitespace)
        || value.contains('#')
        || value.starts_with('"')
        || value.starts_with('\'');

    if !needs_quotes {
        format!("{}={}", name, value)
    } else if value.contains('"') {
        format!("{}='{}'", name, value)
    } else {
        format!("{}=\"{}\"", name, value)
    }
}

/// Append assignments to a `.env` file, leaving existing lines untouched
pub fn append_vars(path: &Path, vars: &[(String, String)]) -> Result<()> {
    if vars.is_empty() {
        return Ok(());
    }

    let mut content = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };

    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for (name, value) in vars {
        content.push_str(&format_line(name, value));
        content.push('\n');
    }

    fs::write(path, content)?;
    Ok(())
}
