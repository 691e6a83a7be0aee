//! Secrets commands - direct secret management in the environment namespace

use console::style;
use std::collections::BTreeMap;
use std::path::Path;

use wiz_core::naming::{self, ENV_SECRET_KEY};
use wiz_core::{EnvVars, PlannedSecret, SecretPlan, SecretSource};
use wiz_kube::secrets::{encoded_data, secret_object, secret_value};
use wiz_kube::{Kubectl, SecretPusher};

use crate::error::{CliError, Result};
use crate::workspace::{Tools, Workspace};
use crate::{GlobalArgs, SecretsCommand, display};

/// Run a secrets subcommand
pub async fn run(global: &GlobalArgs, command: SecretsCommand) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let namespace = workspace.namespace()?;
    let tools = Tools::for_workspace(global, &workspace);
    let kubectl = tools.kubectl();

    match command {
        SecretsCommand::List => list(&kubectl, namespace).await,
        SecretsCommand::Get { name, no_parse } => get(&kubectl, namespace, &name, no_parse).await,
        SecretsCommand::Set { name, value } => set(&kubectl, namespace, &name, &value).await,
        SecretsCommand::SetFile { local, remote } => {
            set_file(&kubectl, namespace, &workspace.env_name, &local, &remote).await
        }
        SecretsCommand::Rm { name } => {
            kubectl.delete_secret(namespace, &name).await?;
            display::success(&format!("Deleted {}", style(&name).cyan()));
            Ok(())
        }
        SecretsCommand::SetAsEnvar { name, value } => {
            let secret_name = naming::env_secret_name(&workspace.env_name, &name);
            set(&kubectl, namespace, &secret_name, &value).await
        }
        SecretsCommand::SetFromEnvFile { path } => {
            set_from_env_file(&kubectl, namespace, &workspace.env_name, &path).await
        }
    }
}

async fn list(kubectl: &Kubectl<'_>, namespace: &str) -> Result<()> {
    let secrets = kubectl.list_secrets(namespace).await?;
    if secrets.is_empty() {
        println!("No secrets in namespace {}", namespace);
        return Ok(());
    }

    println!("{:<48} {:<36} {}", style("NAME").bold(), style("TYPE").bold(), style("DATA").bold());
    for secret in &secrets {
        println!(
            "{:<48} {:<36} {}",
            secret.metadata.name.as_deref().unwrap_or_default(),
            secret.type_.as_deref().unwrap_or("Opaque"),
            secret.data.as_ref().map_or(0, BTreeMap::len)
        );
    }
    Ok(())
}

async fn get(kubectl: &Kubectl<'_>, namespace: &str, name: &str, no_parse: bool) -> Result<()> {
    let secret = kubectl.get_secret(namespace, name).await?;

    if no_parse {
        let json = serde_json::to_string_pretty(&encoded_data(&secret))
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    let value = secret_value(&secret, ENV_SECRET_KEY).ok_or_else(|| CliError::External {
        message: format!("Secret {} has no `{}` key", name, ENV_SECRET_KEY),
        help: Some("Use --no-parse to see every key".to_string()),
    })?;
    println!("{}", String::from_utf8_lossy(value));
    Ok(())
}

async fn set(kubectl: &Kubectl<'_>, namespace: &str, name: &str, value: &str) -> Result<()> {
    let secret = secret_object(
        namespace,
        name,
        BTreeMap::from([(ENV_SECRET_KEY.to_string(), value.as_bytes().to_vec())]),
    );
    kubectl.apply_secret(&secret).await?;
    display::success(&format!("Saved {}", style(name).cyan()));
    Ok(())
}

async fn set_from_env_file(
    kubectl: &Kubectl<'_>,
    namespace: &str,
    env_name: &str,
    path: &Path,
) -> Result<()> {
    let vars = EnvVars::from_file(path)?;
    let plan = SecretPlan {
        secrets: vars
            .iter()
            .map(|(var, value)| PlannedSecret {
                name: naming::env_secret_name(env_name, var),
                source: SecretSource::EnvVar(var.to_string()),
                data: BTreeMap::from([(ENV_SECRET_KEY.to_string(), value.as_bytes().to_vec())]),
            })
            .collect(),
        skipped: Vec::new(),
    };

    push_plan(kubectl, namespace, &plan).await
}

/// Store `local` under its remote file name in the mount secret of the
/// remote directory, keeping files already stored there
async fn set_file(
    kubectl: &Kubectl<'_>,
    namespace: &str,
    env_name: &str,
    local: &Path,
    remote: &str,
) -> Result<()> {
    let (group, file_name) = naming::split_remote_path(remote).ok_or_else(|| {
        CliError::usage_with_help(
            format!("`{}` has no directory to mount", remote),
            "Give the full path inside the container, e.g. /etc/app/config.json",
        )
    })?;
    let content = std::fs::read(local).map_err(|e| CliError::Io {
        message: format!("{}: {}", local.display(), e),
    })?;
    let name = naming::mount_secret_name(env_name, group);

    let mut data: BTreeMap<String, Vec<u8>> = match kubectl.get_secret(namespace, &name).await {
        Ok(existing) => existing
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect(),
        Err(e) if e.is_not_found() => BTreeMap::new(),
        Err(e) => return Err(e.into()),
    };
    data.insert(file_name.to_string(), content);

    println!(
        "{} {} will be available at /{}/{}",
        style("→").blue().bold(),
        local.display(),
        group,
        file_name
    );
    let plan = SecretPlan {
        secrets: vec![PlannedSecret {
            name,
            source: SecretSource::Files(group.to_string()),
            data,
        }],
        skipped: Vec::new(),
    };
    push_plan(kubectl, namespace, &plan).await
}

async fn push_plan(kubectl: &Kubectl<'_>, namespace: &str, plan: &SecretPlan) -> Result<()> {
    let report = SecretPusher::new(kubectl, namespace)
        .push(plan, |secret, result| match result {
            Ok(()) => display::success(&format!("Saved {}", style(&secret.name).cyan())),
            Err(e) => display::failure(&format!("{}: {}", style(&secret.name).cyan(), e)),
        })
        .await?;
    report.ensure_success()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiz_kube::MockRunner;

    fn local_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_set_file_stores_bytes_under_remote_dir() {
        let dir = TempDir::new().unwrap();
        let bytes = vec![0u8, 159, 146, 150, b'{', b'}', b'\n'];
        let local = local_file(&dir, "local.json", &bytes);

        let mock = MockRunner::new();
        let kubectl = Kubectl::new(&mock, "kubectl", None);
        set_file(&kubectl, "ns", "staging", &local, "/etc/app/config.json")
            .await
            .unwrap();

        let secret = mock.secret("ns", "mntsecret-staging-etc-app").unwrap();
        assert_eq!(secret_value(&secret, "config.json"), Some(bytes.as_slice()));
        assert_eq!(secret.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_file_keeps_other_files_in_dir() {
        let dir = TempDir::new().unwrap();
        let first = local_file(&dir, "a", b"first");
        let second = local_file(&dir, "b", b"second");

        let mock = MockRunner::new();
        let kubectl = Kubectl::new(&mock, "kubectl", None);
        set_file(&kubectl, "ns", "staging", &first, "/etc/app/a.conf").await.unwrap();
        set_file(&kubectl, "ns", "staging", &second, "/etc/app/b.conf").await.unwrap();

        let secret = mock.secret("ns", "mntsecret-staging-etc-app").unwrap();
        assert_eq!(secret_value(&secret, "a.conf"), Some(&b"first"[..]));
        assert_eq!(secret_value(&secret, "b.conf"), Some(&b"second"[..]));
    }

    #[tokio::test]
    async fn test_set_file_requires_remote_dir() {
        let dir = TempDir::new().unwrap();
        let local = local_file(&dir, "a", b"x");

        let mock = MockRunner::new();
        let kubectl = Kubectl::new(&mock, "kubectl", None);
        for remote in ["config.json", "/config.json"] {
            let err = set_file(&kubectl, "ns", "staging", &local, remote)
                .await
                .unwrap_err();
            assert_eq!(err.exit_code(), crate::exit_codes::USAGE_ERROR);
        }
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_set_file_missing_local_file() {
        let mock = MockRunner::new();
        let kubectl = Kubectl::new(&mock, "kubectl", None);
        let err = set_file(
            &kubectl,
            "ns",
            "staging",
            Path::new("/definitely/not/here"),
            "/etc/app/config.json",
        )
        .await
        .unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::IO_ERROR);
        assert!(err.to_string().contains("/definitely/not/here"));
    }
}
