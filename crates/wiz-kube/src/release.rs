//! Helm release orchestration

use std::io::Write;
use std::path::{Path, PathBuf};

use wiz_core::Values;
use wiz_core::envdir::CHART_FILE;

use crate::error::{KubeError, Result};
use crate::runner::{CommandOutput, CommandRunner, Invocation};

/// Default helm binary
pub const HELM: &str = "helm";

/// Where a chart comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartRef {
    /// Chart directory on disk; needs `helm dependency update`
    Local(PathBuf),
    /// Repository or OCI reference passed to helm as-is
    Remote(String),
}

impl ChartRef {
    /// Resolve `chart` from `wiz.yml` against the environment directory
    pub fn resolve(env_root: &Path, chart: &str) -> Self {
        let candidate = env_root.join(chart);
        if candidate.join(CHART_FILE).is_file() {
            let path = candidate.canonicalize().unwrap_or(candidate);
            ChartRef::Local(path)
        } else {
            ChartRef::Remote(chart.to_string())
        }
    }

    /// Argument handed to helm
    pub fn as_arg(&self) -> String {
        match self {
            ChartRef::Local(path) => path.display().to_string(),
            ChartRef::Remote(reference) => reference.clone(),
        }
    }
}

/// One `helm upgrade --install`
#[derive(Debug, Clone)]
pub struct ReleaseRequest<'a> {
    pub release_name: &'a str,
    pub namespace: &'a str,
    pub chart: &'a ChartRef,
    pub values: &'a Values,
}

/// helm bound to one runner, binary and optional kube context
pub struct Helm<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
    context: Option<String>,
}

impl<'a> Helm<'a> {
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
        let inv = Invocation::new(&self.program).args(args);
        match &self.context {
            Some(context) => inv.arg(format!("--kube-context={}", context)),
            None => inv,
        }
    }

    async fn exec(&self, inv: Invocation) -> Result<CommandOutput> {
        self.runner.run(&inv).await?.check(&inv)
    }

    pub async fn dependency_update(&self, chart_dir: &Path) -> Result<CommandOutput> {
        self.exec(self.command([
            "dependency".to_string(),
            "update".to_string(),
            chart_dir.display().to_string(),
        ]))
        .await
    }

    /// Install or upgrade; a non-zero exit is [`KubeError::ReleaseFailed`]
    pub async fn upgrade_install(&self, request: &ReleaseRequest<'_>) -> Result<CommandOutput> {
        let mut values_file = tempfile::Builder::new()
            .prefix("wiz-values-")
            .suffix(".yaml")
            .tempfile()?;
        values_file.write_all(request.values.to_yaml()?.as_bytes())?;
        values_file.flush()?;

        let inv = self.command([
            "upgrade".to_string(),
            "--install".to_string(),
            "--create-namespace".to_string(),
            format!("--namespace={}", request.namespace),
            request.release_name.to_string(),
            request.chart.as_arg(),
            format!("--values={}", values_file.path().display()),
        ]);
        let out = self.runner.run(&inv).await?;
        if !out.success() {
            return Err(KubeError::ReleaseFailed {
                release: request.release_name.to_string(),
                status: out.status_text(),
                output: out.combined(),
            });
        }
        Ok(out)
    }

    pub async fn history(&self, namespace: &str, release: &str) -> Result<CommandOutput> {
        self.exec(self.command([
            "history".to_string(),
            format!("--namespace={}", namespace),
            release.to_string(),
        ]))
        .await
    }

    pub async fn rollback(
        &self,
        namespace: &str,
        release: &str,
        revision: u32,
    ) -> Result<CommandOutput> {
        self.exec(self.command([
            "rollback".to_string(),
            format!("--namespace={}", namespace),
            release.to_string(),
            revision.to_string(),
        ]))
        .await
    }

    pub async fn uninstall(&self, namespace: &str, release: &str) -> Result<CommandOutput> {
        self.exec(self.command([
            "uninstall".to_string(),
            format!("--namespace={}", namespace),
            release.to_string(),
        ]))
        .await
    }
}

/// Runs a release end to end
pub struct ReleaseOrchestrator<'a> {
    helm: &'a Helm<'a>,
}

impl<'a> ReleaseOrchestrator<'a> {
    pub fn new(helm: &'a Helm<'a>) -> Self {
        Self { helm }
    }

    /// Update local chart dependencies, then install or upgrade
    ///
    /// A non-zero helm exit at either step is [`KubeError::ReleaseFailed`].
    /// Nothing is rolled back on failure.
    pub async fn release(&self, request: &ReleaseRequest<'_>) -> Result<CommandOutput> {
        if let ChartRef::Local(dir) = request.chart {
            tracing::debug!(chart = %dir.display(), "updating chart dependencies");
            self.helm
                .dependency_update(dir)
                .await
                .map_err(|e| match e {
                    KubeError::CommandFailed { status, output, .. } => KubeError::ReleaseFailed {
                        release: request.release_name.to_string(),
                        status,
                        output,
                    },
                    other => other,
                })?;
        }
        self.helm.upgrade_install(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRunner;
    use tempfile::TempDir;

    fn values() -> Values {
        Values::from_yaml("image: nginx:1.27\nglobal:\n  region: us-east\n").unwrap()
    }

    #[test]
    fn test_chart_resolution() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Chart.yaml"), "name: app\n").unwrap();
        let env = dir.path().join("staging");
        std::fs::create_dir(&env).unwrap();

        match ChartRef::resolve(&env, "..") {
            ChartRef::Local(path) => assert_eq!(path, dir.path().canonicalize().unwrap()),
            other => panic!("expected local chart, got {other:?}"),
        }
        assert_eq!(
            ChartRef::resolve(&env, "oci://ghcr.io/acme/app"),
            ChartRef::Remote("oci://ghcr.io/acme/app".into())
        );
    }

    #[tokio::test]
    async fn test_local_release_updates_dependencies_first() {
        let mock = MockRunner::new();
        let helm = Helm::new(&mock, "helm", Some("kind-dev".into()));
        let chart = ChartRef::Local(PathBuf::from("/charts/app"));
        let values = values();

        ReleaseOrchestrator::new(&helm)
            .release(&ReleaseRequest {
                release_name: "app-staging",
                namespace: "staging",
                chart: &chart,
                values: &values,
            })
            .await
            .unwrap();

        let lines = mock.command_lines("helm");
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "helm dependency update /charts/app --kube-context=kind-dev"
        );
        assert!(lines[1].starts_with(
            "helm upgrade --install --create-namespace --namespace=staging app-staging /charts/app --values="
        ));
        assert!(lines[1].ends_with("--kube-context=kind-dev"));

        // The values file holds exactly the rendered document
        assert_eq!(mock.values_files(), vec![values.to_yaml().unwrap()]);
    }

    #[tokio::test]
    async fn test_remote_release_skips_dependencies() {
        let mock = MockRunner::new();
        let helm = Helm::new(&mock, "helm", None);
        let chart = ChartRef::Remote("acme/app".into());
        let values = values();

        ReleaseOrchestrator::new(&helm)
            .release(&ReleaseRequest {
                release_name: "app",
                namespace: "ns",
                chart: &chart,
                values: &values,
            })
            .await
            .unwrap();

        let lines = mock.command_lines("helm");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" acme/app "));
    }

    #[tokio::test]
    async fn test_release_failure_carries_output() {
        let mock = MockRunner::new().on(
            "helm",
            &["upgrade"],
            CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: "Error: UPGRADE FAILED: timed out\n".into(),
            },
        );
        let helm = Helm::new(&mock, "helm", None);
        let chart = ChartRef::Remote("acme/app".into());
        let values = values();

        let err = ReleaseOrchestrator::new(&helm)
            .release(&ReleaseRequest {
                release_name: "app",
                namespace: "ns",
                chart: &chart,
                values: &values,
            })
            .await
            .unwrap_err();

        match err {
            KubeError::ReleaseFailed {
                release,
                status,
                output,
            } => {
                assert_eq!(release, "app");
                assert_eq!(status, "exit status 1");
                assert_eq!(output, "Error: UPGRADE FAILED: timed out");
            }
            other => panic!("unexpected error: {other}"),
        }
        // No rollback attempted
        assert_eq!(mock.command_lines("helm").len(), 1);
    }

    #[tokio::test]
    async fn test_dependency_failure_stops_release() {
        let mock = MockRunner::new().on("helm", &["dependency"], CommandOutput::failed(1, "no repo"));
        let helm = Helm::new(&mock, "helm", None);
        let chart = ChartRef::Local(PathBuf::from("/charts/app"));
        let values = values();

        let err = ReleaseOrchestrator::new(&helm)
            .release(&ReleaseRequest {
                release_name: "app",
                namespace: "ns",
                chart: &chart,
                values: &values,
            })
            .await
            .unwrap_err();
        match err {
            KubeError::ReleaseFailed { release, output, .. } => {
                assert_eq!(release, "app");
                assert_eq!(output, "no repo");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mock.command_lines("helm").len(), 1);
    }

    #[tokio::test]
    async fn test_history_rollback_uninstall() {
        let mock = MockRunner::new();
        let helm = Helm::new(&mock, "helm", None);

        helm.history("ns", "app").await.unwrap();
        helm.rollback("ns", "app", 3).await.unwrap();
        helm.uninstall("ns", "app").await.unwrap();

        assert_eq!(
            mock.command_lines("helm"),
            vec![
                "helm history --namespace=ns app",
                "helm rollback --namespace=ns app 3",
                "helm uninstall --namespace=ns app",
            ]
        );
    }
}
