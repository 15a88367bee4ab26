use super::connect_client;
use colored::Colorize;

pub async fn handle(region: &str, only: &[String]) -> anyhow::Result<()> {
    let client = connect_client(Some(region)).await?;
    let registry = cloudrig_aws::sweepers(&client);

    println!(
        "{} {} ({})",
        "Sweeping".blue().bold(),
        region.cyan(),
        if only.is_empty() {
            registry.names().join(", ")
        } else {
            only.join(", ")
        }
    );

    let summary = registry.run(region, only).await?;

    for (name, report) in &summary.reports {
        println!(
            "  {} {name}: {} deleted",
            if report.failed.is_empty() { "✓".green() } else { "✗".red() },
            report.deleted.len()
        );
        for failure in &report.failed {
            println!("      {}", failure.red());
        }
    }
    for (name, reason) in &summary.skipped {
        println!("  {} {name}: skipped ({reason})", "-".dimmed());
    }
    for (name, error) in &summary.errors {
        println!("  {} {name}: {error}", "✗".red());
    }

    if !summary.is_success() {
        anyhow::bail!("sweep of {region} finished with errors");
    }
    Ok(())
}
