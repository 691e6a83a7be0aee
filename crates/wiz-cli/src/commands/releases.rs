//! Releases commands - history, rollback and uninstall

use console::style;

use crate::error::Result;
use crate::workspace::{Tools, Workspace};
use crate::{GlobalArgs, ReleasesCommand, display};

/// Run a releases subcommand
pub async fn run(global: &GlobalArgs, command: ReleasesCommand) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let namespace = workspace.namespace()?;
    let release = workspace.release_name();
    let tools = Tools::for_workspace(global, &workspace);
    let helm = tools.helm();

    match command {
        ReleasesCommand::List => {
            let output = helm.history(namespace, release).await?;
            print!("{}", output.stdout);
        }
        ReleasesCommand::Rollback { revision } => {
            display::action(
                "Rolling back",
                &format!("{} to revision {}", release, revision),
            );
            helm.rollback(namespace, release, revision).await?;
            display::success(&format!(
                "Rolled back {} to revision {}",
                style(release).cyan(),
                style(revision).yellow()
            ));
        }
        ReleasesCommand::Nuke => {
            display::action("Uninstalling", release);
            helm.uninstall(namespace, release).await?;
            display::success(&format!("Uninstalled {}", style(release).cyan()));
        }
    }
    Ok(())
}
