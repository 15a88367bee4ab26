//! `aws_glue_workflow`

use super::tags::GlueTags;
use crate::awserr::{codes, not_found_as_none, sdk_error};
use crate::conns::AwsClient;
use async_trait::async_trait;
use aws_sdk_glue::types::Workflow;
use cloudrig_core::sweep::{SweepReport, skip_sweep_error};
use cloudrig_core::{
    CloudError, KeyValueTags, ResourceConfig, ResourceModule, ResourceState, Result, Sweeper,
    TagService, update_tags,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

pub const RESOURCE_TYPE: &str = "aws_glue_workflow";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkflowConfig {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    default_run_properties: BTreeMap<String, String>,
    #[serde(default)]
    max_concurrent_runs: Option<i32>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl WorkflowConfig {
    fn from_resource(config: &ResourceConfig) -> Result<Self> {
        let parsed: Self = config.parse()?;
        if parsed.name.is_empty() || parsed.name.len() > 255 {
            return Err(CloudError::InvalidConfig(format!(
                "{}: name must be 1 to 255 characters",
                config.key()
            )));
        }
        if parsed.max_concurrent_runs.is_some_and(|n| n < 1) {
            return Err(CloudError::InvalidConfig(format!(
                "{}: max_concurrent_runs must be at least 1",
                config.key()
            )));
        }
        Ok(parsed)
    }

    fn run_properties(&self) -> Option<HashMap<String, String>> {
        if self.default_run_properties.is_empty() {
            None
        } else {
            Some(self.default_run_properties.clone().into_iter().collect())
        }
    }
}

pub struct GlueWorkflow {
    client: AwsClient,
    tags: GlueTags,
}

impl GlueWorkflow {
    pub fn new(client: AwsClient) -> Self {
        let tags = GlueTags::new(client.glue.clone());
        Self { client, tags }
    }

    fn arn(&self, name: &str) -> String {
        self.client.regional_arn("glue", &format!("workflow/{name}"))
    }

    /// The workflow, or `None` when it does not exist.
    pub async fn find(&self, name: &str) -> Result<Option<Workflow>> {
        let result = self
            .client
            .glue
            .get_workflow()
            .name(name)
            .include_graph(false)
            .send()
            .await
            .map_err(sdk_error);

        Ok(not_found_as_none(result, &[codes::GLUE_ENTITY_NOT_FOUND])?
            .and_then(|output| output.workflow().cloned()))
    }

    async fn workflow_state(&self, workflow: &Workflow) -> Result<ResourceState> {
        let name = workflow.name().unwrap_or_default();
        let arn = self.arn(name);

        let remote = self
            .tags
            .list_tags(&arn)
            .await
            .map_err(|e| e.context(format!("error listing tags for Glue Workflow ({arn})")))?;
        let policy = &self.client.tag_policy;

        let properties: BTreeMap<String, String> = workflow
            .default_run_properties()
            .map(|p| p.clone().into_iter().collect())
            .unwrap_or_default();

        Ok(ResourceState::new(name, RESOURCE_TYPE)
            .with_attributes(json!({
                "arn": arn,
                "name": name,
                "description": workflow.description(),
                "default_run_properties": properties,
                "max_concurrent_runs": workflow.max_concurrent_runs(),
                "tags": policy.declared_view(&remote).to_json(),
                "tags_all": policy.remote_view(&remote).to_json(),
            })))
    }

    async fn read_state(&self, name: &str) -> Result<ResourceState> {
        match self.find(name).await? {
            Some(workflow) => self.workflow_state(&workflow).await,
            None => Err(CloudError::ResourceNotFound(format!("Glue Workflow ({name})"))),
        }
    }
}

#[async_trait]
impl ResourceModule for GlueWorkflow {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn force_new_attributes(&self) -> &[&str] {
        &["name"]
    }

    async fn create(&self, config: &ResourceConfig) -> Result<ResourceState> {
        let parsed = WorkflowConfig::from_resource(config)?;
        let tags = self
            .client
            .tag_policy
            .resolve(&KeyValueTags::from(parsed.tags.clone()));

        tracing::debug!("Creating Glue Workflow: {}", parsed.name);
        self.client
            .glue
            .create_workflow()
            .name(&parsed.name)
            .set_description(parsed.description.clone())
            .set_default_run_properties(parsed.run_properties())
            .set_max_concurrent_runs(parsed.max_concurrent_runs)
            .set_tags(if tags.is_empty() {
                None
            } else {
                Some(tags.map().into_iter().collect())
            })
            .send()
            .await
            .map_err(|e| {
                sdk_error(e).context(format!("error creating Glue Workflow ({})", parsed.name))
            })?;

        self.read_state(&parsed.name).await
    }

    async fn read(&self, id: &str) -> Result<Option<ResourceState>> {
        match self.find(id).await? {
            Some(workflow) => Ok(Some(self.workflow_state(&workflow).await?)),
            None => {
                tracing::warn!("Glue Workflow ({id}) not found");
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        prior: &ResourceState,
        config: &ResourceConfig,
    ) -> Result<ResourceState> {
        let parsed = WorkflowConfig::from_resource(config)?;
        let name = prior.id.as_str();

        let before: Option<WorkflowConfig> = serde_json::from_value(prior.config.clone()).ok();
        let settings_changed = before.as_ref().is_none_or(|b| {
            b.description != parsed.description
                || b.default_run_properties != parsed.default_run_properties
                || b.max_concurrent_runs != parsed.max_concurrent_runs
        });

        if settings_changed {
            tracing::debug!("Updating Glue Workflow: {name}");
            self.client
                .glue
                .update_workflow()
                .name(name)
                .set_description(parsed.description.clone())
                .set_default_run_properties(parsed.run_properties())
                .set_max_concurrent_runs(parsed.max_concurrent_runs)
                .send()
                .await
                .map_err(|e| {
                    sdk_error(e).context(format!("error updating Glue Workflow ({name})"))
                })?;
        }

        let old_tags = KeyValueTags::from_json(prior.attributes.get("tags_all"));
        let new_tags = self
            .client
            .tag_policy
            .resolve(&KeyValueTags::from(parsed.tags.clone()));
        update_tags(&self.tags, &self.arn(name), &old_tags, &new_tags)
            .await
            .map_err(|e| e.context(format!("error updating tags for Glue Workflow ({name})")))?;

        self.read_state(name).await
    }

    async fn delete(&self, state: &ResourceState) -> Result<()> {
        delete_workflow(&self.client.glue, &state.id).await
    }
}

/// Delete a workflow; one that is already gone is not an error.
pub async fn delete_workflow(client: &aws_sdk_glue::Client, name: &str) -> Result<()> {
    tracing::debug!("Deleting Glue Workflow: {name}");
    let result = client
        .delete_workflow()
        .name(name)
        .send()
        .await
        .map_err(sdk_error);

    not_found_as_none(result, &[codes::GLUE_ENTITY_NOT_FOUND])
        .map(|_| ())
        .map_err(|e| e.context(format!("error deleting Glue Workflow ({name})")))
}

pub struct WorkflowSweeper {
    client: AwsClient,
}

impl WorkflowSweeper {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Sweeper for WorkflowSweeper {
    fn name(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn sweep(&self, region: &str) -> Result<SweepReport> {
        let mut report = SweepReport::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = match self
                .client
                .glue
                .list_workflows()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_error)
            {
                Ok(page) => page,
                // Some endpoints that do not support workflows answer InternalFailure
                Err(e) if skip_sweep_error(&e) || e.code_equals(codes::GLUE_INTERNAL_FAILURE) => {
                    tracing::warn!("Skipping Glue Workflow sweep for {region}: {e}");
                    return Ok(report);
                }
                Err(e) => return Err(e.context("error retrieving Glue Workflows")),
            };

            for name in page.workflows() {
                let outcome = delete_workflow(&self.client.glue, name).await;
                report.record(name.clone(), outcome);
            }

            match page.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(config: serde_json::Value) -> ResourceConfig {
        ResourceConfig::new(RESOURCE_TYPE, "test", config)
    }

    #[test]
    fn test_parse_config() {
        let parsed = WorkflowConfig::from_resource(&resource(json!({
            "name": "wf",
            "default_run_properties": {
                "--run-prop1": "firstPropValue",
                "--run-prop2": "secondPropValue",
            },
            "max_concurrent_runs": 2,
            "tags": {"key1": "value1"},
        })))
        .unwrap();

        assert_eq!(parsed.max_concurrent_runs, Some(2));
        assert_eq!(parsed.run_properties().unwrap().len(), 2);
        assert_eq!(parsed.tags["key1"], "value1");
    }

    #[test]
    fn test_empty_run_properties_not_sent() {
        let parsed = WorkflowConfig::from_resource(&resource(json!({"name": "wf"}))).unwrap();
        assert!(parsed.run_properties().is_none());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(WorkflowConfig::from_resource(&resource(json!({"name": ""}))).is_err());
        let zero_runs = resource(json!({"name": "wf", "max_concurrent_runs": 0}));
        assert!(
            WorkflowConfig::from_resource(&zero_runs)
                .unwrap_err()
                .to_string()
                .contains("max_concurrent_runs")
        );
        let bad_schedule = resource(json!({"name": "wf", "schedule": "x"}));
        assert!(WorkflowConfig::from_resource(&bad_schedule).is_err());
    }
}
