//! wiz-kube - kubectl and helm plumbing for wizk8s
//!
//! This crate provides:
//! - **Runners**: [`CommandRunner`] with a process-backed and an in-memory implementation
//! - **kubectl**: namespaces, contexts and Secret objects
//! - **Secret pushing**: upserting a [`wiz_core::SecretPlan`] with per-secret reporting
//! - **Releases**: `helm upgrade --install` with rendered values, history, rollback, uninstall

pub mod error;
pub mod kubectl;
pub mod mock;
pub mod push;
pub mod release;
pub mod runner;
pub mod secrets;

pub use error::{KubeError, Result};
pub use kubectl::Kubectl;
pub use mock::MockRunner;
pub use push::{PushReport, SecretPusher};
pub use release::{ChartRef, Helm, ReleaseOrchestrator, ReleaseRequest};
pub use runner::{CommandOutput, CommandRunner, Invocation, ProcessRunner};
pub use secrets::RegistryCredentials;
