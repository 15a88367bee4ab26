use super::{connect, load_manifest, print_plan};
use cloudrig_core::CloudProvider;
use colored::Colorize;
use std::path::Path;

pub async fn handle(project_root: &Path, file: &Path) -> anyhow::Result<()> {
    let desired = load_manifest(file)?;
    println!(
        "{} {} ({} resources)",
        "Planning".blue(),
        file.display().to_string().cyan(),
        desired.len()
    );

    let provider = connect(project_root).await?;
    let plan = provider.plan(&desired).await?;

    println!();
    if !plan.has_changes() {
        println!("{}", "No changes. Infrastructure matches the manifest.".green());
        return Ok(());
    }
    print_plan(&plan);
    Ok(())
}
