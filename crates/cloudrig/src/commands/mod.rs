pub mod apply;
pub mod auth;
pub mod destroy;
pub mod plan;
pub mod quota;
pub mod state;
pub mod sweep;
pub mod tags;

use anyhow::Context;
use cloudrig_aws::{AwsClient, AwsProvider};
use cloudrig_core::{ActionType, Manifest, Plan, ResourceSet};
use colored::Colorize;
use std::collections::HashSet;
use std::path::Path;

/// Read a `resources: [{type, name, config}]` manifest. `.json` files are
/// parsed as JSON, everything else as YAML.
pub fn load_manifest(path: &Path) -> anyhow::Result<ResourceSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;

    let manifest: Manifest = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?,
    };

    let mut seen = HashSet::new();
    for resource in &manifest.resources {
        if resource.resource_type.is_empty() || resource.name.is_empty() {
            anyhow::bail!("{}: every resource needs a type and a name", path.display());
        }
        if !seen.insert(resource.key()) {
            anyhow::bail!("{}: {} is declared twice", path.display(), resource.key());
        }
    }

    tracing::debug!(
        "Loaded {} resources from {}",
        manifest.resources.len(),
        path.display()
    );
    Ok(manifest.into())
}

/// Build an AWS client from the discovered provider config.
pub async fn connect_client(region: Option<&str>) -> anyhow::Result<AwsClient> {
    let mut config = cloudrig_config::load()?;
    if let Some(region) = region {
        config.region = Some(region.to_string());
    }
    AwsClient::new(&config)
        .await
        .context("failed to configure the AWS client")
}

pub async fn connect(project_root: &Path) -> anyhow::Result<AwsProvider> {
    let client = connect_client(None).await?;
    Ok(AwsProvider::new(client, project_root))
}

pub fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        let symbol = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Replace => "-/+".magenta(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => continue,
        };
        println!("  {} {}", symbol, action.description());
        for (attribute, change) in &action.details {
            println!("      {}: {}", attribute.dimmed(), change);
        }
    }
    println!();
    println!("{} {}", "Plan:".bold(), plan.summary());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_yaml_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.yaml");
        fs::write(
            &path,
            r#"
resources:
  - type: aws_glue_workflow
    name: nightly
    config:
      name: nightly-etl
      max_concurrent_runs: 2
  - type: aws_glue_connection
    name: orders
"#,
        )
        .unwrap();

        let set = load_manifest(&path).unwrap();
        assert_eq!(set.len(), 2);
        let workflow = set.get("aws_glue_workflow.nightly").unwrap();
        assert_eq!(workflow.require_str("name").unwrap(), "nightly-etl");
        assert_eq!(workflow.get_config::<i64>("max_concurrent_runs"), Some(2));
        assert!(set.get("aws_glue_connection.orders").unwrap().config.is_object());
    }

    #[test]
    fn test_load_json_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.json");
        fs::write(
            &path,
            r#"{"resources": [
                {"type": "aws_ecs_task_definition", "name": "web", "config": {"family": "web"}}
            ]}"#,
        )
        .unwrap();

        let set = load_manifest(&path).unwrap();
        assert!(set.get("aws_ecs_task_definition.web").is_some());
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.yaml");
        fs::write(
            &path,
            "resources:\n  \
             - {type: aws_glue_workflow, name: a}\n  \
             - {type: aws_glue_workflow, name: a}\n",
        )
        .unwrap();

        let err = load_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_missing_manifest() {
        let err = load_manifest(Path::new("/nonexistent/resources.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read manifest"));
    }
}
