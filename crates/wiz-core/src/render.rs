//! Rendering a deployment spec into a Helm values document
//!
//! Rendering is pure: every input is loaded beforehand and passed in through
//! [`RenderContext`], and map keys are emitted in sorted order, so the same
//! inputs always produce the same document. `genvalues` relies on this to be
//! an exact preview of what `release` hands to Helm.

use serde_json::{Value as JsonValue, json};
use std::collections::BTreeMap;

use crate::envfile::EnvVars;
use crate::error::{CoreError, Result};
use crate::naming;
use crate::secretfiles::SecretFiles;
use crate::spec::{BindingSource, DeploymentSpec, ImageTarget, ValueBinding};
use crate::values::{Values, check_path_conflicts};

/// Everything a render reads
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub spec: &'a DeploymentSpec,
    pub env: &'a EnvVars,
    pub secret_files: &'a SecretFiles,
    /// Resolved environment name, used in secret names
    pub env_name: &'a str,
}

/// Resolve every binding into a values document
///
/// `image` is the reference passed to `release`; it is bound at the spec's
/// image path and takes part in conflict detection like any other binding.
pub fn render(ctx: &RenderContext<'_>, image: Option<&str>) -> Result<Values> {
    let mut targets: Vec<(String, JsonValue)> = Vec::new();

    for binding in &ctx.spec.bindings {
        targets.push((binding.path.clone(), resolve(ctx, binding)?));
    }

    if let Some(image) = image {
        targets.extend(image_targets(&ctx.spec.image, image));
    }

    targets.extend(wiring_targets(ctx)?);

    check_path_conflicts(targets.iter().map(|(path, _)| path.as_str()))?;

    let mut values = Values::new();
    for (path, value) in targets {
        values.set(&path, value);
    }
    Ok(values)
}

fn resolve(ctx: &RenderContext<'_>, binding: &ValueBinding) -> Result<JsonValue> {
    match &binding.source {
        BindingSource::Literal(value) => Ok(value.clone()),
        BindingSource::Env(name) => {
            ctx.env
                .get(name)
                .map(|v| JsonValue::String(v.to_string()))
                .ok_or_else(|| CoreError::MissingEnvVar {
                    name: name.clone(),
                    binding: binding.path.clone(),
                })
        }
        BindingSource::SecretFile(key) => {
            let file = ctx
                .secret_files
                .get(key)
                .ok_or_else(|| CoreError::MissingSecretFile {
                    key: key.clone(),
                    binding: binding.path.clone(),
                })?;
            Ok(json!({
                "secretName": naming::mount_secret_name(ctx.env_name, file.group()),
                "key": file.file_name(),
            }))
        }
    }
}

/// Split an image reference into repository and tag
///
/// `ghcr.io/org/app:1.2` gives `("ghcr.io/org/app", "1.2")`, a missing tag
/// defaults to `latest`, and a digest reference keeps the digest as the tag.
pub fn split_image_ref(image: &str) -> (String, String) {
    if let Some((repo, digest)) = image.split_once('@') {
        return (repo.to_string(), digest.to_string());
    }
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(idx) => {
            let split_at = name_start + idx;
            (image[..split_at].to_string(), image[split_at + 1..].to_string())
        }
        None => (image.to_string(), "latest".to_string()),
    }
}

fn image_targets(target: &ImageTarget, image: &str) -> Vec<(String, JsonValue)> {
    if target.split {
        let (repository, tag) = split_image_ref(image);
        vec![
            (format!("{}.repository", target.path), JsonValue::String(repository)),
            (format!("{}.tag", target.path), JsonValue::String(tag)),
        ]
    } else {
        vec![(target.path.clone(), JsonValue::String(image.to_string()))]
    }
}

fn wiring_targets(ctx: &RenderContext<'_>) -> Result<Vec<(String, JsonValue)>> {
    let mut targets = Vec::new();

    if ctx.spec.wiring.env_secrets {
        let env: Vec<JsonValue> = env_secret_names(ctx.env_name, ctx.env)?
            .into_iter()
            .map(|(var, secret_name)| {
                json!({
                    "name": var,
                    "valueFrom": {
                        "secretKeyRef": {
                            "key": naming::ENV_SECRET_KEY,
                            "name": secret_name,
                        }
                    }
                })
            })
            .collect();
        targets.push(("env".to_string(), JsonValue::Array(env)));
    }

    if ctx.spec.wiring.secret_mounts {
        let mut volumes = Vec::new();
        let mut mounts = Vec::new();
        for (group, secret_name) in mount_secret_names(ctx.env_name, ctx.secret_files)? {
            let Some(mount_path) = naming::mount_path(group) else {
                tracing::warn!(
                    secret = %secret_name,
                    "files directly under secretfiles/ have no mount path; not mounting"
                );
                continue;
            };
            volumes.push(json!({
                "name": secret_name,
                "secret": { "secretName": secret_name },
            }));
            mounts.push(json!({
                "mountPath": mount_path,
                "name": secret_name,
                "readOnly": true,
            }));
        }
        targets.push(("volumes".to_string(), JsonValue::Array(volumes)));
        targets.push(("volumeMounts".to_string(), JsonValue::Array(mounts)));
    }

    if let Some(name) = &ctx.spec.image_pull_secret {
        targets.push(("imagePullSecrets".to_string(), json!([{ "name": name }])));
    }

    Ok(targets)
}

/// Env secret name of every `.env` variable, in `.env` order
pub(crate) fn env_secret_names<'a>(
    env_name: &str,
    env: &'a EnvVars,
) -> Result<Vec<(&'a str, String)>> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    let mut names = Vec::new();
    for var in env.names() {
        let secret_name = naming::env_secret_name(env_name, var);
        if let Some(previous) = seen.insert(secret_name.clone(), var) {
            return Err(CoreError::SecretNameCollision {
                name: secret_name,
                first: previous.to_string(),
                second: var.to_string(),
            });
        }
        names.push((var, secret_name));
    }
    Ok(names)
}

/// Mount secret name of every `secretfiles/` group, sorted by group
pub(crate) fn mount_secret_names<'a>(
    env_name: &str,
    files: &'a SecretFiles,
) -> Result<Vec<(&'a str, String)>> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    let mut names = Vec::new();
    for group in files.groups().into_keys() {
        let secret_name = naming::mount_secret_name(env_name, group);
        if let Some(previous) = seen.insert(secret_name.clone(), group) {
            return Err(CoreError::SecretNameCollision {
                name: secret_name,
                first: previous.to_string(),
                second: group.to_string(),
            });
        }
        names.push((group, secret_name));
    }
    Ok(names)
}
