//! Mock command runner for testing
//!
//! Emulates the handful of kubectl calls wizk8s makes against an in-memory
//! cluster, answers anything else from scripted rules, and records every
//! invocation for assertions. No cluster or binaries required.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use crate::error::Result;
use crate::runner::{CommandOutput, CommandRunner, Invocation};

/// Context reported by `kubectl config current-context`
pub const MOCK_CONTEXT: &str = "mock-context";

/// Scripted answer for invocations whose args contain `tokens` in order
#[derive(Debug, Clone)]
struct Rule {
    program: String,
    tokens: Vec<String>,
    output: CommandOutput,
}

#[derive(Debug, Default)]
struct Cluster {
    namespaces: BTreeSet<String>,
    /// (namespace, name) -> secret
    secrets: BTreeMap<(String, String), Secret>,
}

/// In-memory command runner for testing
#[derive(Clone, Default)]
pub struct MockRunner {
    rules: Arc<RwLock<Vec<Rule>>>,
    calls: Arc<RwLock<Vec<Invocation>>>,
    /// Contents of `--values` files, read when helm is invoked
    values_files: Arc<RwLock<Vec<String>>>,
    cluster: Arc<RwLock<Cluster>>,
    /// Secret names whose apply fails
    rejected: Arc<RwLock<BTreeSet<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer matching invocations with `output`; first matching rule wins
    pub fn on(self, program: &str, tokens: &[&str], output: CommandOutput) -> Self {
        self.rules.write().unwrap().push(Rule {
            program: program.to_string(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            output,
        });
        self
    }

    /// Pre-create a namespace
    pub fn with_namespace(self, namespace: &str) -> Self {
        self.cluster
            .write()
            .unwrap()
            .namespaces
            .insert(namespace.to_string());
        self
    }

    /// Make `kubectl apply` fail for the secret named `name`
    pub fn reject_secret(self, name: &str) -> Self {
        self.rejected.write().unwrap().insert(name.to_string());
        self
    }

    /// Every invocation so far
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.read().unwrap().clone()
    }

    /// Invocations of `program`, as display strings
    pub fn command_lines(&self, program: &str) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|inv| inv.program == program)
            .map(Invocation::display)
            .collect()
    }

    /// Contents of every `--values` file handed to helm
    pub fn values_files(&self) -> Vec<String> {
        self.values_files.read().unwrap().clone()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.cluster
            .read()
            .unwrap()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn secret_names(&self, namespace: &str) -> Vec<String> {
        self.cluster
            .read()
            .unwrap()
            .secrets
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.cluster.read().unwrap().namespaces.contains(namespace)
    }

    fn scripted(&self, inv: &Invocation) -> Option<CommandOutput> {
        self.rules
            .read()
            .unwrap()
            .iter()
            .find(|rule| rule.program == inv.program && contains_in_order(&inv.args, &rule.tokens))
            .map(|rule| rule.output.clone())
    }

    fn capture_values_files(&self, inv: &Invocation) {
        let mut args = inv.args.iter();
        while let Some(arg) = args.next() {
            let path = match arg.strip_prefix("--values=") {
                Some(path) => Some(path.to_string()),
                None if arg == "--values" || arg == "-f" => args.next().cloned(),
                None => None,
            };
            if let Some(content) = path.and_then(|p| std::fs::read_to_string(p).ok()) {
                self.values_files.write().unwrap().push(content);
            }
        }
    }

    fn kubectl(&self, inv: &Invocation) -> CommandOutput {
        let parsed = KubectlArgs::parse(&inv.args);
        let positional: Vec<&str> = parsed.positional.iter().map(String::as_str).collect();
        let namespace = parsed.namespace.unwrap_or_else(|| "default".to_string());
        let mut cluster = self.cluster.write().unwrap();

        match positional.as_slice() {
            ["config", "current-context"] => CommandOutput::ok(format!("{}\n", MOCK_CONTEXT)),
            ["get", "namespace", name] => {
                if cluster.namespaces.contains(*name) {
                    CommandOutput::ok(format!("namespace/{}\n", name))
                } else {
                    not_found("namespaces", name)
                }
            }
            ["create", "namespace", name] => {
                if !cluster.namespaces.insert(name.to_string()) {
                    return CommandOutput::failed(
                        1,
                        format!("Error from server (AlreadyExists): namespaces \"{}\" already exists", name),
                    );
                }
                CommandOutput::ok(format!("namespace/{} created\n", name))
            }
            ["apply"] => {
                let Some(stdin) = &inv.stdin else {
                    return CommandOutput::failed(1, "error: no objects passed to apply");
                };
                let secret: Secret = match serde_yaml::from_slice(stdin) {
                    Ok(secret) => secret,
                    Err(e) => return CommandOutput::failed(1, format!("error: {}", e)),
                };
                let name = secret.metadata.name.clone().unwrap_or_default();
                if self.rejected.read().unwrap().contains(&name) {
                    return CommandOutput::failed(
                        1,
                        format!("Error from server (Forbidden): secrets \"{}\" is forbidden", name),
                    );
                }
                let ns = secret
                    .metadata
                    .namespace
                    .clone()
                    .unwrap_or_else(|| namespace.clone());
                cluster.secrets.insert((ns, name.clone()), secret);
                CommandOutput::ok(format!("secret/{} configured\n", name))
            }
            ["get", "secret", name] => {
                match cluster.secrets.get(&(namespace.clone(), name.to_string())) {
                    Some(secret) => match serde_json::to_string(secret) {
                        Ok(json) => CommandOutput::ok(json),
                        Err(e) => CommandOutput::failed(1, e.to_string()),
                    },
                    None => not_found("secrets", name),
                }
            }
            ["get", "secrets"] => {
                let items: Vec<&Secret> = cluster
                    .secrets
                    .iter()
                    .filter(|((ns, _), _)| *ns == namespace)
                    .map(|(_, secret)| secret)
                    .collect();
                let list = serde_json::json!({ "apiVersion": "v1", "kind": "List", "items": items });
                CommandOutput::ok(list.to_string())
            }
            ["delete", "secret", name] => {
                match cluster.secrets.remove(&(namespace.clone(), name.to_string())) {
                    Some(_) => CommandOutput::ok(format!("secret \"{}\" deleted\n", name)),
                    None => not_found("secrets", name),
                }
            }
            _ => CommandOutput::ok(""),
        }
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.write().unwrap().push(invocation.clone());
        self.capture_values_files(invocation);

        if let Some(output) = self.scripted(invocation) {
            return Ok(output);
        }
        if invocation.program.ends_with("kubectl") {
            return Ok(self.kubectl(invocation));
        }
        Ok(CommandOutput::ok(""))
    }
}

fn not_found(kind: &str, name: &str) -> CommandOutput {
    CommandOutput::failed(
        1,
        format!("Error from server (NotFound): {} \"{}\" not found", kind, name),
    )
}

/// Whether `tokens` appear in `args` in order, not necessarily adjacent
fn contains_in_order(args: &[String], tokens: &[String]) -> bool {
    let mut args = args.iter();
    tokens.iter().all(|token| args.any(|arg| arg == token))
}

/// Positional arguments and namespace of a kubectl command line
struct KubectlArgs {
    positional: Vec<String>,
    namespace: Option<String>,
}

impl KubectlArgs {
    fn parse(args: &[String]) -> Self {
        let mut positional = Vec::new();
        let mut namespace = None;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if let Some(ns) = arg.strip_prefix("--namespace=") {
                namespace = Some(ns.to_string());
            } else if arg == "-n" || arg == "--namespace" {
                namespace = iter.next().cloned();
            } else if arg == "-o" || arg == "-f" {
                iter.next();
            } else if !arg.starts_with('-') {
                positional.push(arg.clone());
            }
        }
        Self {
            positional,
            namespace,
        }
    }
}
