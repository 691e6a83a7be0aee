//! Deciding which cluster secrets `push` writes
//!
//! Only what the rendered values reference is pushed:
//!
//! - with `wiring.envSecrets`, one env secret per `.env` variable;
//! - with `wiring.secretMounts`, one mount secret per `secretfiles/` directory
//!   holding all of its files;
//! - otherwise, for `secretFile` bindings, a mount secret holding only the
//!   bound files of that directory.
//!
//! Files nothing refers to are reported as skipped, since they may be include
//! fragments rather than deployable secrets.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, Result};
use crate::naming;
use crate::render::{RenderContext, env_secret_names, mount_secret_names};
use crate::spec::BindingSource;

/// What a planned secret was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// A `.env` variable
    EnvVar(String),
    /// A `secretfiles/` directory (`""` for top-level files)
    Files(String),
}

/// A Secret object to create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSecret {
    pub name: String,
    pub source: SecretSource,
    /// Data key to raw bytes
    pub data: BTreeMap<String, Vec<u8>>,
}

/// Secrets to push, in push order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretPlan {
    pub secrets: Vec<PlannedSecret>,
    /// Keys of collected files that nothing references
    pub skipped: Vec<String>,
}

impl SecretPlan {
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

/// Build the push plan for an environment
pub fn plan_secrets(ctx: &RenderContext<'_>) -> Result<SecretPlan> {
    let mut plan = SecretPlan::default();

    if ctx.spec.wiring.env_secrets {
        for (var, name) in env_secret_names(ctx.env_name, ctx.env)? {
            let value = ctx.env.get(var).unwrap_or_default();
            plan.secrets.push(PlannedSecret {
                name,
                source: SecretSource::EnvVar(var.to_string()),
                data: BTreeMap::from([(
                    naming::ENV_SECRET_KEY.to_string(),
                    value.as_bytes().to_vec(),
                )]),
            });
        }
    }

    let mut referenced: BTreeSet<&str> = BTreeSet::new();
    for binding in &ctx.spec.bindings {
        if let BindingSource::SecretFile(key) = &binding.source {
            if ctx.secret_files.get(key).is_none() {
                return Err(CoreError::MissingSecretFile {
                    key: key.clone(),
                    binding: binding.path.clone(),
                });
            }
            referenced.insert(key.as_str());
        }
    }

    let groups = ctx.secret_files.groups();
    for (group, name) in mount_secret_names(ctx.env_name, ctx.secret_files)? {
        let mut data = BTreeMap::new();
        for file in groups.get(group).into_iter().flatten() {
            if ctx.spec.wiring.secret_mounts || referenced.contains(file.key.as_str()) {
                data.insert(file.file_name().to_string(), file.content.clone());
            } else {
                plan.skipped.push(file.key.clone());
            }
        }
        if !data.is_empty() {
            plan.secrets.push(PlannedSecret {
                name,
                source: SecretSource::Files(group.to_string()),
                data,
            });
        }
    }

    plan.skipped.sort();
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envfile::EnvVars;
    use crate::secretfiles::{SecretFile, SecretFiles};
    use crate::spec::DeploymentSpec;
    use std::path::PathBuf;

    fn files() -> SecretFiles {
        SecretFiles::from_entries(
            ["certs/tls.crt", "certs/tls.key", "templates/_helpers.tpl", "top.txt"]
                .iter()
                .map(|k| SecretFile {
                    key: k.to_string(),
                    path: PathBuf::from(k),
                    content: format!("content of {}", k).into_bytes(),
                })
                .collect(),
        )
    }

    fn plan(spec_yaml: &str, env: &str) -> Result<SecretPlan> {
        let spec =
            DeploymentSpec::from_yaml(&format!("chart: .\nreleaseName: app\n{}", spec_yaml)).unwrap();
        let env = EnvVars::parse(env, ".env").unwrap();
        let files = files();
        let ctx = RenderContext {
            spec: &spec,
            env: &env,
            secret_files: &files,
            env_name: "dev",
        };
        plan_secrets(&ctx)
    }

    #[test]
    fn test_only_referenced_files_pushed() {
        let plan = plan("values:\n  tls.cert: { secretFile: certs/tls.crt }\n", "").unwrap();

        assert_eq!(plan.secrets.len(), 1);
        let secret = &plan.secrets[0];
        assert_eq!(secret.name, "mntsecret-dev-certs");
        assert_eq!(secret.source, SecretSource::Files("certs".into()));
        assert_eq!(
            secret.data.keys().collect::<Vec<_>>(),
            vec!["tls.crt"]
        );
        assert_eq!(secret.data["tls.crt"], b"content of certs/tls.crt");
        assert_eq!(
            plan.skipped,
            vec!["certs/tls.key", "templates/_helpers.tpl", "top.txt"]
        );
    }

    #[test]
    fn test_nothing_referenced_pushes_nothing() {
        let plan = plan("", "A=1\n").unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.skipped.len(), 4);
    }

    #[test]
    fn test_secret_mounts_push_every_group() {
        let plan = plan("wiring:\n  secretMounts: true\n", "").unwrap();

        let names: Vec<_> = plan.secrets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["mntsecret-dev-root", "mntsecret-dev-certs", "mntsecret-dev-templates"]
        );
        assert_eq!(plan.secrets[1].data.len(), 2);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_env_secrets() {
        let plan = plan("wiring:\n  envSecrets: true\n", "DB_URL=postgres://x\nEMPTY=\n").unwrap();

        assert_eq!(plan.secrets.len(), 2);
        assert_eq!(plan.secrets[0].name, "envsecret-dev-db-url");
        assert_eq!(plan.secrets[0].source, SecretSource::EnvVar("DB_URL".into()));
        assert_eq!(plan.secrets[0].data["value"], b"postgres://x");
        assert_eq!(plan.secrets[1].data["value"], b"");
    }

    #[test]
    fn test_missing_bound_file() {
        let err = plan("values:\n  x: { secretFile: nope }\n", "").unwrap_err();
        assert!(matches!(err, CoreError::MissingSecretFile { .. }));
    }
}
