//! External command execution
//!
//! Everything wizk8s asks of the cluster goes through a [`CommandRunner`]:
//! [`ProcessRunner`] spawns real `kubectl`/`helm` processes, while
//! [`MockRunner`](crate::mock::MockRunner) answers in memory for tests.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{KubeError, Result};

/// A command line to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables for the child
    pub env: Vec<(String, String)>,
    /// Bytes written to the child's stdin
    pub stdin: Option<Vec<u8>>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Command line as shown in logs and errors
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a finished command produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn status_text(&self) -> String {
        match self.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }

    /// Stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let parts: Vec<&str> = [self.stdout.trim(), self.stderr.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        parts.join("\n")
    }

    /// Turn a non-zero exit into [`KubeError::CommandFailed`]
    pub fn check(self, invocation: &Invocation) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(KubeError::CommandFailed {
                command: invocation.display(),
                status: self.status_text(),
                output: self.combined(),
            })
        }
    }
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture output
    ///
    /// A non-zero exit is not an error here; callers decide what it means.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs commands as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        tracing::debug!(command = %invocation.display(), "running");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| KubeError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        // Fed concurrently with draining stdout/stderr, so neither side can
        // fill a pipe and stall the other
        if let (Some(input), Some(mut stdin)) = (invocation.stdin.clone(), child.stdin.take()) {
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    tracing::debug!(error = %e, "child closed stdin early");
                }
                // Dropping stdin closes it, so the child sees EOF
            });
        }

        // Dropping the wait future drops the child, which kills it
        let timeout = self.timeout;
        let command_line = invocation.display();
        let wait = async move {
            let output = child.wait_with_output();
            match timeout {
                Some(limit) => tokio::time::timeout(limit, output)
                    .await
                    .map_err(|_| KubeError::Timeout {
                        command: command_line,
                        seconds: limit.as_secs(),
                    })?
                    .map_err(KubeError::from),
                None => output.await.map_err(KubeError::from),
            }
        };

        let output = tokio::select! {
            output = wait => output?,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(command = %invocation.display(), "interrupted, killing child");
                return Err(KubeError::Interrupted);
            }
        };

        let result = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(status = %result.status_text(), "finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let inv = Invocation::new("helm").args(["upgrade", "--install"]).arg("app");
        assert_eq!(inv.display(), "helm upgrade --install app");
    }

    #[test]
    fn test_check_failure_keeps_output() {
        let inv = Invocation::new("kubectl").arg("apply");
        let err = CommandOutput {
            status: Some(1),
            stdout: "partial\n".into(),
            stderr: "error: boom\n".into(),
        }
        .check(&inv)
        .unwrap_err();

        match err {
            KubeError::CommandFailed {
                command,
                status,
                output,
            } => {
                assert_eq!(command, "kubectl apply");
                assert_eq!(status, "exit status 1");
                assert_eq!(output, "partial\nerror: boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_signal_status() {
        let out = CommandOutput {
            status: None,
            ..Default::default()
        };
        assert!(!out.success());
        assert_eq!(out.status_text(), "terminated by signal");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_captures_output() {
        let runner = ProcessRunner::new();
        let inv = Invocation::new("sh")
            .args(["-c", "cat; echo err >&2; exit 3"])
            .stdin("hello");
        let out = runner.run(&inv).await.unwrap();
        assert_eq!(out.status, Some(3));
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "err\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_before_reading_stdin() {
        // Both payloads exceed a pipe buffer
        let runner = ProcessRunner::with_timeout(Some(Duration::from_secs(10)));
        let inv = Invocation::new("sh")
            .args(["-c", "head -c 200000 /dev/zero; wc -c >&2"])
            .stdin(vec![b'x'; 200_000]);
        let out = runner.run(&inv).await.unwrap();
        assert!(out.success(), "{}", out.stderr);
        assert_eq!(out.stdout.len(), 200_000);
        assert_eq!(out.stderr.trim(), "200000");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_env() {
        let runner = ProcessRunner::new();
        let inv = Invocation::new("sh")
            .args(["-c", "printf %s \"$WIZ_TEST_VAR\""])
            .env("WIZ_TEST_VAR", "set");
        let out = runner.run(&inv).await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "set");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_timeout() {
        let runner = ProcessRunner::with_timeout(Some(Duration::from_millis(100)));
        let err = runner
            .run(&Invocation::new("sleep").arg("5"))
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_process_runner_missing_binary() {
        let err = ProcessRunner::new()
            .run(&Invocation::new("wiz-definitely-not-a-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, KubeError::Spawn { .. }));
    }
}
