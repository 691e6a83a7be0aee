//! kubectl operations
//!
//! Objects go in as YAML on stdin (`kubectl apply -f -`) and come back as
//! JSON (`-o json`), both through the k8s-openapi types.

use k8s_openapi::api::core::v1::Secret;
use serde::Deserialize;

use crate::error::{KubeError, Result};
use crate::runner::{CommandOutput, CommandRunner, Invocation};

/// Default kubectl binary
pub const KUBECTL: &str = "kubectl";

/// `kubectl get secrets -o json` output
#[derive(Debug, Deserialize)]
struct SecretList {
    #[serde(default)]
    items: Vec<Secret>,
}

/// kubectl bound to one runner, binary and optional context
pub struct Kubectl<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
    context: Option<String>,
}

impl<'a> Kubectl<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        program: impl Into<String>,
        context: Option<String>,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            context,
        }
    }

    fn command<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inv = Invocation::new(&self.program);
        if let Some(context) = &self.context {
            inv = inv.arg(format!("--context={}", context));
        }
        inv.args(args)
    }

    async fn exec(&self, inv: Invocation) -> Result<CommandOutput> {
        self.runner.run(&inv).await?.check(&inv)
    }

    /// Name of the context kubectl talks to
    pub async fn current_context(&self) -> Result<String> {
        let out = self.exec(self.command(["config", "current-context"])).await?;
        Ok(out.stdout.trim().to_string())
    }

    pub async fn namespace_exists(&self, namespace: &str) -> Result<bool> {
        let inv = self.command(["get", "namespace", namespace, "-o", "name"]);
        let out = self.runner.run(&inv).await?;
        if is_not_found(&out) {
            return Ok(false);
        }
        out.check(&inv).map(|_| true)
    }

    pub async fn create_namespace(&self, namespace: &str) -> Result<()> {
        self.exec(self.command(["create", "namespace", namespace]))
            .await
            .map(drop)
    }

    /// Create or update a Secret; its namespace comes from its metadata
    pub async fn apply_secret(&self, secret: &Secret) -> Result<()> {
        let manifest = serde_yaml::to_string(secret)?;
        let inv = self.command(["apply", "-f", "-"]).stdin(manifest);
        self.exec(inv).await.map(drop)
    }

    pub async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        let inv = self.command([
            "get".to_string(),
            "secret".to_string(),
            name.to_string(),
            format!("--namespace={}", namespace),
            "-o".to_string(),
            "json".to_string(),
        ]);
        let out = self.runner.run(&inv).await?;
        if is_not_found(&out) {
            return Err(KubeError::NotFound {
                kind: "secret".to_string(),
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        }
        let out = out.check(&inv)?;
        Ok(serde_json::from_str(&out.stdout)?)
    }

    pub async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>> {
        let inv = self.command([
            "get".to_string(),
            "secrets".to_string(),
            format!("--namespace={}", namespace),
            "-o".to_string(),
            "json".to_string(),
        ]);
        let out = self.exec(inv).await?;
        let list: SecretList = serde_json::from_str(&out.stdout)?;
        Ok(list.items)
    }

    pub async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        let inv = self.command([
            "delete".to_string(),
            "secret".to_string(),
            name.to_string(),
            format!("--namespace={}", namespace),
        ]);
        let out = self.runner.run(&inv).await?;
        if is_not_found(&out) {
            return Err(KubeError::NotFound {
                kind: "secret".to_string(),
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        }
        out.check(&inv).map(drop)
    }
}

fn is_not_found(out: &CommandOutput) -> bool {
    !out.success() && out.stderr.contains("(NotFound)")
}
