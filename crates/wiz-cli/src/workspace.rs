//! Resolving the environment directory and settings for a command
//!
//! Precedence for every setting: CLI flag or `WIZ_*` variable, then
//! `wiz.yml`, then the built-in default.

use std::path::Path;
use std::time::Duration;

use wiz_core::{DeploymentSpec, EnvDir, EnvVars, RenderContext, SecretFiles};
use wiz_kube::{ChartRef, Helm, Kubectl, ProcessRunner};

use crate::GlobalArgs;
use crate::error::{CliError, Result};

/// Find the environment directory: `--dirpath`, or the current directory
/// when it holds a `wiz.yml`
pub fn resolve_dir(global: &GlobalArgs) -> Result<EnvDir> {
    if let Some(path) = &global.dirpath {
        return Ok(EnvDir::open(path)?);
    }
    let cwd = std::env::current_dir()?;
    EnvDir::discover(&cwd).ok_or_else(|| {
        CliError::usage_with_help(
            format!("{} is not an environment directory (no wiz.yml)", cwd.display()),
            "Pass --dirpath, cd into the environment directory, or run `wizk8s setup`",
        )
    })
}

/// A loaded environment directory with settings resolved
#[derive(Debug)]
pub struct Workspace {
    pub dir: EnvDir,
    pub spec: DeploymentSpec,
    pub env_name: String,
    namespace: Option<String>,
    pub context: Option<String>,
}

impl Workspace {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let dir = resolve_dir(global)?;
        let spec = DeploymentSpec::load(&dir)?;
        tracing::debug!(dir = %dir.root().display(), release = %spec.release_name, "loaded environment");

        let env_name = spec.env_name_or_default(&dir)?;
        let namespace = global.namespace.clone().or_else(|| spec.namespace.clone());
        let context = global.context.clone().or_else(|| spec.context.clone());
        Ok(Self {
            dir,
            spec,
            env_name,
            namespace,
            context,
        })
    }

    /// Namespace, required by every cluster command
    pub fn namespace(&self) -> Result<&str> {
        self.namespace.as_deref().ok_or_else(|| {
            CliError::config_with_help(
                "No namespace configured",
                "Set `namespace` in wiz.yml or pass --namespace",
            )
        })
    }

    pub fn release_name(&self) -> &str {
        &self.spec.release_name
    }

    pub fn chart(&self) -> ChartRef {
        ChartRef::resolve(self.dir.root(), &self.spec.chart)
    }

    /// Read `.env` and `secretfiles/`
    pub fn inputs(&self) -> Result<Inputs> {
        let env = EnvVars::load(&self.dir, self.spec.requires_env_file())?;
        let files = SecretFiles::collect(&self.dir)?;
        tracing::debug!(vars = env.len(), files = files.len(), "loaded inputs");
        Ok(Inputs { env, files })
    }
}

/// Everything a render reads besides the spec
#[derive(Debug)]
pub struct Inputs {
    pub env: EnvVars,
    pub files: SecretFiles,
}

impl Inputs {
    pub fn render_context<'a>(&'a self, workspace: &'a Workspace) -> RenderContext<'a> {
        RenderContext {
            spec: &workspace.spec,
            env: &self.env,
            secret_files: &self.files,
            env_name: &workspace.env_name,
        }
    }
}

/// External tools configured from the global flags
pub struct Tools {
    runner: ProcessRunner,
    kubectl: String,
    helm: String,
    context: Option<String>,
}

impl Tools {
    pub fn new(global: &GlobalArgs, context: Option<String>) -> Self {
        Self {
            runner: ProcessRunner::with_timeout(global.timeout.map(Duration::from_secs)),
            kubectl: global.kubectl.clone(),
            helm: global.helm.clone(),
            context,
        }
    }

    pub fn for_workspace(global: &GlobalArgs, workspace: &Workspace) -> Self {
        Self::new(global, workspace.context.clone())
    }

    pub fn kubectl(&self) -> Kubectl<'_> {
        Kubectl::new(&self.runner, &self.kubectl, self.context.clone())
    }

    pub fn helm(&self) -> Helm<'_> {
        Helm::new(&self.runner, &self.helm, self.context.clone())
    }
}

/// Path of `target` relative to `base`, using `..` where needed
pub fn relative_path(base: &Path, target: &Path) -> String {
    let base: Vec<_> = base.components().collect();
    let target: Vec<_> = target.components().collect();
    let common = base
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = std::iter::repeat_n("..".to_string(), base.len() - common).collect();
    parts.extend(
        target[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
