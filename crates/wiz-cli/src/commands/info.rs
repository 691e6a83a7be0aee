//! Info command - show where this environment deploys

use crate::GlobalArgs;
use crate::display;
use crate::error::Result;
use crate::workspace::{Tools, Workspace};

/// Run the info command
pub async fn run(global: &GlobalArgs) -> Result<()> {
    let workspace = Workspace::load(global)?;

    let cluster = match &workspace.context {
        Some(context) => context.clone(),
        None => Tools::for_workspace(global, &workspace)
            .kubectl()
            .current_context()
            .await?,
    };

    display::field("cluster", &cluster);
    display::field("namespace", workspace.namespace().unwrap_or("(not set)"));
    display::field("env", &workspace.env_name);
    display::field("release_name", workspace.release_name());
    display::field("chart", &workspace.chart().as_arg());
    Ok(())
}
