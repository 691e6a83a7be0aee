//! wiz-core - Environment directories and Helm values rendering
//!
//! An environment directory holds everything needed to deploy one chart to
//! one cluster namespace:
//! - `wiz.yml`: the [`DeploymentSpec`] binding value paths to sources
//! - `.env`: plain variables ([`EnvVars`])
//! - `secretfiles/`: files pushed as cluster secrets ([`SecretFiles`])
//!
//! Everything here is pure; talking to the cluster lives in `wiz-kube`.

pub mod envdir;
pub mod envfile;
pub mod error;
pub mod naming;
pub mod plan;
pub mod render;
pub mod secretfiles;
pub mod setup;
pub mod spec;
pub mod values;

pub use envdir::EnvDir;
pub use envfile::EnvVars;
pub use error::{CoreError, Result};
pub use plan::{PlannedSecret, SecretPlan, SecretSource, plan_secrets};
pub use render::{RenderContext, render, split_image_ref};
pub use secretfiles::{SecretFile, SecretFiles};
pub use spec::{BindingSource, DeploymentSpec, ImageTarget, ValueBinding, Wiring};
pub use values::Values;
