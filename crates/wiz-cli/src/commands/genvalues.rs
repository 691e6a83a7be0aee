//! Genvalues command - print the rendered Helm values

use crate::GlobalArgs;
use crate::error::Result;
use crate::workspace::Workspace;

/// Run the genvalues command
///
/// Purely local: reads the environment directory and prints YAML on stdout.
pub fn run(global: &GlobalArgs, image: Option<&str>) -> Result<()> {
    let workspace = Workspace::load(global)?;
    let inputs = workspace.inputs()?;

    let values = wiz_core::render(&inputs.render_context(&workspace), image)?;
    print!("{}", values.to_yaml()?);
    Ok(())
}
