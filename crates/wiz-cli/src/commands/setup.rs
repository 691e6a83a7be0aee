//! Setup command - interactive first run
//!
//! Fills in whatever `wiz.yml` and `.env` lack, then makes sure the
//! namespace and image pull secret exist in the cluster.

use console::style;
use rand::Rng;
use serde_yaml::Mapping;
use std::path::Path;

use wiz_core::envfile::append_vars;
use wiz_core::envdir::chart_name;
use wiz_core::setup::{
    self, ExistingSetup, SetupDefaults, SetupKey, apply_to_document, plan_config, plan_registry,
};
use wiz_core::{DeploymentSpec, EnvDir, EnvVars};
use wiz_kube::secrets::docker_registry_secret;
use wiz_kube::{Kubectl, RegistryCredentials};

use crate::GlobalArgs;
use crate::display;
use crate::error::{CliError, Result};
use crate::prompt;
use crate::workspace::{Tools, Workspace, relative_path};

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 5;

/// Run the setup command
pub async fn run(global: &GlobalArgs, no_registry: bool) -> Result<()> {
    let dir = setup_dir(global)?;
    let spec_path = dir.spec_path();
    let document = read_document(&spec_path)?;

    let mut existing = ExistingSetup::from_document(document.as_ref());
    existing.missing_env_vars = missing_env_vars(&dir)?;

    let defaults = defaults(global, &dir, no_registry).await;
    let mut flow = plan_config(&existing, &defaults);

    if !flow.is_empty() {
        println!(
            "{} Setting up {}",
            style("→").blue().bold(),
            style(dir.root().display()).cyan()
        );
        prompt::run_flow(&mut flow).await?;
    }
    if flow.is_aborted() {
        display::skipped("Leaving wiz.yml unchanged");
        return Ok(());
    }

    let mut document = document.unwrap_or_else(setup::skeleton_document);
    if apply_to_document(&mut document, &flow) {
        let yaml = serde_yaml::to_string(&document)
            .map_err(|e| CliError::internal(e.to_string()))?;
        std::fs::write(&spec_path, yaml)?;
        display::success(&format!("Wrote {}", spec_path.display()));
    }

    let vars = flow.env_vars();
    if !vars.is_empty() {
        append_vars(&dir.env_path(), &vars)?;
        display::success(&format!(
            "Added {} variable(s) to {}",
            vars.len(),
            dir.env_path().display()
        ));
    }

    let mut global = global.clone();
    global.dirpath = Some(dir.root().to_path_buf());
    let workspace = Workspace::load(&global)?;
    let namespace = workspace.namespace()?;
    let tools = Tools::for_workspace(&global, &workspace);
    let kubectl = tools.kubectl();

    ensure_namespace(&kubectl, namespace).await?;

    if !no_registry && let Some(name) = &workspace.spec.image_pull_secret {
        ensure_pull_secret(&kubectl, namespace, name).await?;
    }

    display::success("Setup complete");
    Ok(())
}

/// `--dirpath` (created if missing) or the current directory
fn setup_dir(global: &GlobalArgs) -> Result<EnvDir> {
    match &global.dirpath {
        Some(path) => {
            std::fs::create_dir_all(path)?;
            Ok(EnvDir::new(path))
        }
        None => Ok(EnvDir::new(std::env::current_dir()?)),
    }
}

/// Existing `wiz.yml` as a raw mapping, so unknown keys survive a rewrite
fn read_document(path: &Path) -> Result<Option<Mapping>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Some(Mapping::new()));
    }
    serde_yaml::from_str(&content).map(Some).map_err(|e| {
        CliError::config_with_help(
            format!("Invalid {}: {}", path.display(), e),
            "wiz.yml must be a YAML mapping",
        )
    })
}

/// Variables bound in `wiz.yml` that `.env` does not define
fn missing_env_vars(dir: &EnvDir) -> Result<Vec<String>> {
    // An incomplete spec is what setup is for; there is nothing to check yet
    let Ok(spec) = DeploymentSpec::load(dir) else {
        return Ok(Vec::new());
    };
    let env = EnvVars::load(dir, false)?;

    let mut missing: Vec<String> = Vec::new();
    for name in spec.referenced_env_vars() {
        if !env.contains(name) && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    Ok(missing)
}

async fn defaults(global: &GlobalArgs, dir: &EnvDir, no_registry: bool) -> SetupDefaults {
    let context = match &global.context {
        Some(context) => Some(context.clone()),
        None => {
            let tools = Tools::new(global, None);
            match tools.kubectl().current_context().await {
                Ok(context) if !context.is_empty() => Some(context),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!(error = %e, "no current kubectl context");
                    None
                }
            }
        }
    };

    let chart_dir = dir.find_chart_dir();
    let root = dir
        .root()
        .canonicalize()
        .unwrap_or_else(|_| dir.root().to_path_buf());

    SetupDefaults {
        context,
        namespace: global.namespace.clone(),
        env_name: Some(dir.name()),
        chart: chart_dir.as_deref().map(|chart| relative_path(&root, chart)),
        chart_name: chart_dir.as_deref().and_then(|chart| chart_name(chart).ok()),
        pull_secret_suffix: (!no_registry).then(random_suffix),
    }
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.random_range(0..SUFFIX_CHARSET.len())] as char)
        .collect()
}

async fn ensure_namespace(kubectl: &Kubectl<'_>, namespace: &str) -> Result<()> {
    if kubectl.namespace_exists(namespace).await? {
        display::success(&format!("Namespace {} exists", style(namespace).cyan()));
    } else {
        kubectl.create_namespace(namespace).await?;
        display::success(&format!("Created namespace {}", style(namespace).cyan()));
    }
    Ok(())
}

async fn ensure_pull_secret(kubectl: &Kubectl<'_>, namespace: &str, name: &str) -> Result<()> {
    match kubectl.get_secret(namespace, name).await {
        Ok(_) => {
            display::success(&format!("Image pull secret {} exists", style(name).cyan()));
            return Ok(());
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    println!(
        "Docker registry secret {} does not exist. Creating it...",
        style(name).cyan()
    );
    println!("(For GitHub, use a personal access token as the password)");

    let mut flow = plan_registry();
    prompt::run_flow(&mut flow).await?;

    let answer = |key: SetupKey| flow.get(&key).unwrap_or_default().to_string();
    let creds = RegistryCredentials {
        server: answer(SetupKey::RegistryServer),
        email: answer(SetupKey::RegistryEmail),
        username: answer(SetupKey::RegistryUsername),
        password: answer(SetupKey::RegistryPassword),
    };

    kubectl
        .apply_secret(&docker_registry_secret(namespace, name, &creds))
        .await?;
    display::success(&format!("Created image pull secret {}", style(name).cyan()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_random_suffix_shape() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| SUFFIX_CHARSET.contains(&b)));
    }

    #[test]
    fn test_read_document_keeps_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wiz.yml");
        std::fs::write(&path, "chart: ..\ncustom: kept\n").unwrap();

        let doc = read_document(&path).unwrap().unwrap();
        assert_eq!(doc.get("custom").and_then(|v| v.as_str()), Some("kept"));
        assert!(read_document(&dir.path().join("missing.yml")).unwrap().is_none());
    }

    #[test]
    fn test_read_document_rejects_non_mapping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wiz.yml");
        std::fs::write(&path, "- a\n- b\n").unwrap();
        assert!(read_document(&path).is_err());
    }

    #[test]
    fn test_missing_env_vars() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("wiz.yml"),
            "chart: ..\nreleaseName: app\nvalues:\n  a: { env: A }\n  b: { env: B }\n  c: { env: A }\n",
        )
        .unwrap();
        std::fs::write(dir.path().join(".env"), "B=1\n").unwrap();

        let missing = missing_env_vars(&EnvDir::new(dir.path())).unwrap();
        assert_eq!(missing, vec!["A"]);
    }
}
