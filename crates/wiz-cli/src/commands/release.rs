//! Release command - helm upgrade --install with rendered values

use console::style;
use wiz_kube::{ReleaseOrchestrator, ReleaseRequest};

use crate::GlobalArgs;
use crate::display;
use crate::error::Result;
use crate::workspace::{Tools, Workspace};

/// Run the release command
pub async fn run(global: &GlobalArgs, image: &str) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let namespace = workspace.namespace()?;
    let inputs = workspace.inputs()?;
    let values = wiz_core::render(&inputs.render_context(&workspace), Some(image))?;
    let chart = workspace.chart();

    println!(
        "{} Deploying image {} as release {} in {}",
        style("→").blue().bold(),
        style(image).yellow(),
        style(workspace.release_name()).cyan(),
        style(namespace).cyan()
    );

    let tools = Tools::for_workspace(global, &workspace);
    let helm = tools.helm();
    let output = ReleaseOrchestrator::new(&helm)
        .release(&ReleaseRequest {
            release_name: workspace.release_name(),
            namespace,
            chart: &chart,
            values: &values,
        })
        .await?;

    if !output.stdout.trim().is_empty() {
        println!("{}", output.stdout.trim_end());
    }
    display::success(&format!(
        "Released {}",
        style(workspace.release_name()).cyan()
    ));
    Ok(())
}
