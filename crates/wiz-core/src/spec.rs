//! Deployment spec (`wiz.yml`) loading
//!
//! ```yaml
//! chart: ../
//! releaseName: myapp-staging
//! namespace: staging
//! wiring:
//!   envSecrets: true
//! values:
//!   global.region: { env: REGION }
//!   replicaCount: 3
//!   tls.cert: { secretFile: certs/tls.crt }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use std::path::Path;

use crate::envdir::EnvDir;
use crate::error::{CoreError, Result};
use crate::naming;

/// Where a bound value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum BindingSource {
    /// Copied as-is
    Literal(JsonValue),
    /// Looked up in `.env`
    Env(String),
    /// Logical key under `secretfiles/`
    SecretFile(String),
}

/// A Helm value path and its source
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBinding {
    /// Dot-notation path, e.g. `global.region`
    pub path: String,
    pub source: BindingSource,
}

/// Where the image reference passed to `release` is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageTarget {
    #[serde(default = "default_image_path")]
    pub path: String,

    /// Split into `<path>.repository` and `<path>.tag`
    #[serde(default)]
    pub split: bool,
}

fn default_image_path() -> String {
    "image".to_string()
}

impl Default for ImageTarget {
    fn default() -> Self {
        Self {
            path: default_image_path(),
            split: false,
        }
    }
}

/// Values generated from the directory contents instead of explicit bindings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wiring {
    /// Every `.env` variable becomes an `env` entry backed by an env secret
    #[serde(default)]
    pub env_secrets: bool,

    /// Every `secretfiles/` directory becomes a volume and volume mount
    #[serde(default)]
    pub secret_mounts: bool,
}

/// Parsed `wiz.yml`
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentSpec {
    /// Chart path (relative to the environment directory) or remote reference
    pub chart: String,
    pub release_name: String,
    pub namespace: Option<String>,
    pub context: Option<String>,
    pub env_name: Option<String>,
    pub image_pull_secret: Option<String>,
    pub image: ImageTarget,
    pub wiring: Wiring,
    pub bindings: Vec<ValueBinding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSpec {
    chart: Option<String>,
    release_name: Option<String>,
    namespace: Option<String>,
    context: Option<String>,
    env_name: Option<String>,
    image_pull_secret: Option<String>,
    image: Option<ImageTarget>,
    wiring: Option<Wiring>,
    values: Option<IndexMap<String, YamlValue>>,
}

impl DeploymentSpec {
    /// Load the spec of an environment directory
    pub fn load(dir: &EnvDir) -> Result<Self> {
        let path = dir.spec_path();
        if !path.is_file() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse spec YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(CoreError::spec("chart", "missing required key"));
        }

        let raw: RawSpec =
            serde_yaml::from_str(content).map_err(|e| CoreError::spec("wiz.yml", e.to_string()))?;

        let chart = required(raw.chart, "chart")?;
        let release_name = required(raw.release_name, "releaseName")?;

        let bindings = raw
            .values
            .unwrap_or_default()
            .into_iter()
            .map(|(path, value)| parse_binding(path, value))
            .collect::<Result<Vec<_>>>()?;

        let image = raw.image.unwrap_or_default();
        check_path(&image.path, "image.path")?;

        let env_name = non_empty(raw.env_name);
        if let Some(name) = &env_name {
            check_env_name(name)?;
        }

        Ok(Self {
            chart,
            release_name,
            namespace: non_empty(raw.namespace),
            context: non_empty(raw.context),
            env_name,
            image_pull_secret: non_empty(raw.image_pull_secret),
            image,
            wiring: raw.wiring.unwrap_or_default(),
            bindings,
        })
    }

    /// Environment name, falling back to the directory name
    ///
    /// The name ends up in Secret names, so it must be a DNS label.
    pub fn env_name_or_default(&self, dir: &EnvDir) -> Result<String> {
        let name = self.env_name.clone().unwrap_or_else(|| dir.name());
        check_env_name(&name)?;
        Ok(name)
    }

    /// Whether rendering needs `.env` to exist
    pub fn requires_env_file(&self) -> bool {
        self.wiring.env_secrets || self.referenced_env_vars().next().is_some()
    }

    /// Variable names referenced by env bindings
    pub fn referenced_env_vars(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().filter_map(|b| match &b.source {
            BindingSource::Env(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| CoreError::spec(field, "missing required key"))
}

fn check_env_name(name: &str) -> Result<()> {
    if naming::is_dns_label(name) {
        Ok(())
    } else {
        Err(CoreError::spec(
            "envName",
            format!(
                "`{}` is not a valid environment name (lowercase letters, digits and '-'); set envName in wiz.yml",
                name
            ),
        ))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn check_path(path: &str, field: &str) -> Result<()> {
    if path.split('.').any(str::is_empty) {
        return Err(CoreError::spec(field, format!("invalid value path '{}'", path)));
    }
    Ok(())
}

fn parse_binding(path: String, value: YamlValue) -> Result<ValueBinding> {
    let field = format!("values.{}", path);
    check_path(&path, &field)?;

    let source = match value {
        YamlValue::Mapping(map) => {
            let mut entries = map.into_iter();
            let (Some((kind, inner)), None) = (entries.next(), entries.next()) else {
                return Err(CoreError::spec(
                    field,
                    "a binding needs exactly one of `literal`, `env`, `secretFile`",
                ));
            };
            match kind.as_str() {
                Some("literal") => BindingSource::Literal(to_json(inner, &field)?),
                Some("env") => BindingSource::Env(reference(inner, &field)?),
                Some("secretFile") => BindingSource::SecretFile(reference(inner, &field)?),
                Some(other) => {
                    return Err(CoreError::spec(
                        field,
                        format!("unknown source kind `{}`", other),
                    ));
                }
                None => return Err(CoreError::spec(field, "source kind must be a string")),
            }
        }
        YamlValue::Tagged(_) => {
            return Err(CoreError::spec(field, "tagged values are not supported"));
        }
        other => BindingSource::Literal(to_json(other, &field)?),
    };

    Ok(ValueBinding { path, source })
}

fn reference(value: YamlValue, field: &str) -> Result<String> {
    match value {
        YamlValue::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(CoreError::spec(field, "reference must be a non-empty string")),
    }
}

fn to_json(value: YamlValue, field: &str) -> Result<JsonValue> {
    serde_json::to_value(value).map_err(|e| CoreError::spec(field, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: CoreError) -> String {
        match err {
            CoreError::SpecParse { field, .. } => field,
            other => panic!("expected SpecParse, got {other}"),
        }
    }

    #[test]
    fn test_parse_full_spec() {
        let spec = DeploymentSpec::from_yaml(
            r#"
chart: ../
releaseName: myapp-staging
namespace: staging
envName: staging
imagePullSecret: regcred
image:
  path: app.image
  split: true
wiring:
  envSecrets: true
values:
  global.region: { env: REGION }
  replicaCount: 3
  tags: [a, b]
  config: { literal: { debug: true } }
  tls.cert: { secretFile: certs/tls.crt }
"#,
        )
        .unwrap();

        assert_eq!(spec.chart, "../");
        assert_eq!(spec.release_name, "myapp-staging");
        assert_eq!(spec.namespace.as_deref(), Some("staging"));
        assert_eq!(spec.image_pull_secret.as_deref(), Some("regcred"));
        assert_eq!(spec.image.path, "app.image");
        assert!(spec.image.split);
        assert!(spec.wiring.env_secrets);
        assert!(!spec.wiring.secret_mounts);

        let sources: Vec<_> = spec.bindings.iter().map(|b| &b.source).collect();
        assert_eq!(
            sources,
            vec![
                &BindingSource::Env("REGION".into()),
                &BindingSource::Literal(serde_json::json!(3)),
                &BindingSource::Literal(serde_json::json!(["a", "b"])),
                &BindingSource::Literal(serde_json::json!({"debug": true})),
                &BindingSource::SecretFile("certs/tls.crt".into()),
            ]
        );
    }

    #[test]
    fn test_defaults() {
        let spec = DeploymentSpec::from_yaml("chart: ../\nreleaseName: app\n").unwrap();
        assert!(spec.bindings.is_empty());
        assert_eq!(spec.image, ImageTarget::default());
        assert_eq!(spec.wiring, Wiring::default());
        assert!(spec.namespace.is_none());
        assert!(!spec.requires_env_file());
    }

    #[test]
    fn test_invalid_env_name() {
        let err =
            DeploymentSpec::from_yaml("chart: .\nreleaseName: app\nenvName: Staging_3\n").unwrap_err();
        assert_eq!(field_of(err), "envName");
    }

    #[test]
    fn test_env_name_from_dir_is_checked() {
        let root = tempfile::TempDir::new().unwrap();
        let spec = DeploymentSpec::from_yaml("chart: .\nreleaseName: app\n").unwrap();

        let bad = root.path().join("Staging_3");
        std::fs::create_dir(&bad).unwrap();
        let err = spec.env_name_or_default(&EnvDir::new(&bad)).unwrap_err();
        assert_eq!(field_of(err), "envName");

        let good = root.path().join("staging");
        std::fs::create_dir(&good).unwrap();
        assert_eq!(spec.env_name_or_default(&EnvDir::new(&good)).unwrap(), "staging");

        // An explicit envName wins over an unusable directory name
        let named =
            DeploymentSpec::from_yaml("chart: .\nreleaseName: app\nenvName: prod\n").unwrap();
        assert_eq!(named.env_name_or_default(&EnvDir::new(&bad)).unwrap(), "prod");
    }

    #[test]
    fn test_missing_chart() {
        let err = DeploymentSpec::from_yaml("releaseName: app\n").unwrap_err();
        assert_eq!(field_of(err), "chart");
    }

    #[test]
    fn test_missing_release_name() {
        let err = DeploymentSpec::from_yaml("chart: ../\n").unwrap_err();
        assert_eq!(field_of(err), "releaseName");
    }

    #[test]
    fn test_empty_document() {
        let err = DeploymentSpec::from_yaml("  \n").unwrap_err();
        assert_eq!(field_of(err), "chart");
    }

    #[test]
    fn test_unknown_source_kind() {
        let err = DeploymentSpec::from_yaml(
            "chart: .\nreleaseName: app\nvalues:\n  db.password: { vault: secret/db }\n",
        )
        .unwrap_err();
        assert_eq!(field_of(err), "values.db.password");
    }

    #[test]
    fn test_two_source_kinds() {
        let err = DeploymentSpec::from_yaml(
            "chart: .\nreleaseName: app\nvalues:\n  a: { env: A, literal: b }\n",
        )
        .unwrap_err();
        assert_eq!(field_of(err), "values.a");
    }

    #[test]
    fn test_invalid_yaml() {
        let err = DeploymentSpec::from_yaml("chart: [unclosed\n").unwrap_err();
        assert!(matches!(err, CoreError::SpecParse { .. }));
    }

    #[test]
    fn test_invalid_value_path() {
        let err =
            DeploymentSpec::from_yaml("chart: .\nreleaseName: app\nvalues:\n  a..b: 1\n").unwrap_err();
        assert_eq!(field_of(err), "values.a..b");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let spec = DeploymentSpec::from_yaml(
            "chart: .\nreleaseName: app\nfutureFeature:\n  enabled: true\n",
        )
        .unwrap();
        assert_eq!(spec.release_name, "app");
    }

    #[test]
    fn test_requires_env_file() {
        let spec =
            DeploymentSpec::from_yaml("chart: .\nreleaseName: app\nvalues:\n  a: { env: A }\n")
                .unwrap();
        assert!(spec.requires_env_file());
        assert_eq!(spec.referenced_env_vars().collect::<Vec<_>>(), vec!["A"]);
    }
}
