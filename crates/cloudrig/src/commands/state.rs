use super::connect;
use cloudrig_core::{CloudProvider, ProjectState, StateStore};
use colored::Colorize;
use std::path::Path;

pub async fn handle_list(project_root: &Path, refresh: bool) -> anyhow::Result<()> {
    let state = if refresh {
        connect(project_root).await?.get_state().await?
    } else {
        StateStore::new(project_root).load().await?
    };

    if state.resources.is_empty() {
        println!("{}", "No resources recorded in state".dimmed());
        return Ok(());
    }
    print_table(&state);
    Ok(())
}

pub async fn handle_show(project_root: &Path, key: &str) -> anyhow::Result<()> {
    let state = StateStore::new(project_root).load().await?;
    let resource = state
        .get_resource(key)
        .ok_or_else(|| anyhow::anyhow!("{key} is not recorded in state"))?;
    println!("{}", serde_json::to_string_pretty(resource)?);
    Ok(())
}

fn print_table(state: &ProjectState) {
    println!(
        "{}",
        format!("{:<45} {:<24} {}", "RESOURCE", "STATUS", "ID").bold()
    );
    println!("{}", "─".repeat(100).dimmed());
    for (key, resource) in &state.resources {
        let status = match &resource.remote_status {
            Some(remote) => format!("{} ({remote})", resource.status),
            None => resource.status.to_string(),
        };
        println!("{:<45} {:<24} {}", key.cyan(), status, resource.id);
    }
    println!();
    println!(
        "{} resources, last updated {}",
        state.resources.len(),
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
