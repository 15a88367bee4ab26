use super::{connect, load_manifest, print_plan};
use cloudrig_core::CloudProvider;
use colored::Colorize;
use std::path::Path;

pub async fn handle(project_root: &Path, file: &Path, yes: bool) -> anyhow::Result<()> {
    let desired = load_manifest(file)?;
    let provider = connect(project_root).await?;

    let plan = provider.plan(&desired).await?;
    if !plan.has_changes() {
        println!("{}", "No changes. Infrastructure matches the manifest.".green());
        return Ok(());
    }
    print_plan(&plan);

    if !yes {
        println!();
        println!("Run again with --yes to apply these changes");
        return Ok(());
    }

    println!();
    println!("{}", "Applying...".blue().bold());
    let result = provider.apply(&plan, &desired).await?;

    for outcome in &result.outcomes {
        let mark = if outcome.is_ok() { "✓".green() } else { "✗".red() };
        println!("  {} {}", mark, outcome.message());
    }

    println!();
    let elapsed_ms = result.elapsed.as_millis();
    if let Some(error) = result.first_error() {
        anyhow::bail!(
            "apply failed after {elapsed_ms}ms: {} succeeded, {} failed (first error: {error})",
            result.succeeded().count(),
            result.failed().count()
        );
    }
    println!(
        "{} {} actions in {elapsed_ms}ms",
        "Apply complete!".green().bold(),
        result.succeeded().count()
    );
    Ok(())
}
