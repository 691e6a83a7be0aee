//! Push command - upsert referenced secrets

use console::style;

use crate::GlobalArgs;
use crate::display;
use crate::error::Result;
use crate::workspace::{Tools, Workspace};

/// Run the push command
pub async fn run(global: &GlobalArgs) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let namespace = workspace.namespace()?;
    let inputs = workspace.inputs()?;

    // Everything is validated before the first secret is written
    let ctx = inputs.render_context(&workspace);
    wiz_core::render(&ctx, None)?;
    let plan = wiz_core::plan_secrets(&ctx)?;

    for key in &plan.skipped {
        display::skipped(&format!("secretfiles/{} is not referenced, skipping", key));
    }
    if plan.is_empty() {
        println!("Nothing to push");
        return Ok(());
    }

    display::action(
        "Pushing",
        &format!("{} secret(s) to namespace {}", plan.secrets.len(), namespace),
    );

    let tools = Tools::for_workspace(global, &workspace);
    let kubectl = tools.kubectl();
    let pusher = wiz_kube::SecretPusher::new(&kubectl, namespace);

    let report = pusher
        .push(&plan, |secret, result| match result {
            Ok(()) => display::success(&format!(
                "{} ({} key(s))",
                style(&secret.name).cyan(),
                secret.data.len()
            )),
            Err(e) => display::failure(&format!("{}: {}", style(&secret.name).cyan(), e)),
        })
        .await?;

    report.ensure_success()?;
    display::success(&format!("Pushed {} secret(s)", report.pushed.len()));
    Ok(())
}
