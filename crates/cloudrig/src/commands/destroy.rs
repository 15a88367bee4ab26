use super::{connect, load_manifest};
use cloudrig_core::CloudProvider;
use colored::Colorize;
use std::path::Path;

pub async fn handle(project_root: &Path, file: Option<&Path>, yes: bool) -> anyhow::Result<()> {
    let provider = connect(project_root).await?;
    let state = provider.recorded_state().await?;

    let targets: Vec<String> = match file {
        Some(file) => {
            let declared = load_manifest(file)?;
            declared
                .resources
                .keys()
                .rev()
                .filter(|key| state.resources.contains_key(*key))
                .cloned()
                .collect()
        }
        None => state.resources.keys().cloned().collect(),
    };

    if targets.is_empty() {
        println!("{}", "Nothing to destroy.".dimmed());
        return Ok(());
    }

    for key in &targets {
        println!("  {} {key}", "-".red());
    }

    if !yes {
        println!();
        println!(
            "{}",
            format!("Warning: {} resources will be permanently deleted.", targets.len()).yellow()
        );
        println!("Run again with --yes to destroy them");
        return Ok(());
    }

    println!();
    if file.is_none() {
        let result = provider.destroy_all().await?;
        if let Some(error) = result.first_error() {
            anyhow::bail!("destroy failed: {error}");
        }
    } else {
        for key in &targets {
            provider.destroy(key).await?;
            println!("  {} {key} destroyed", "✓".green());
        }
    }

    println!("{}", "Destroy complete!".green().bold());
    Ok(())
}
