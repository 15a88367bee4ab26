//! AWS provider
//!
//! Wires every resource module, data source and sweeper onto one
//! [`AwsClient`] and drives them through the core engine against the
//! project's state file.

use crate::arn::Arn;
use crate::conns::AwsClient;
use crate::directconnect::{DirectConnectTags, DxHostedConnection};
use crate::ec2::LocalGatewayRouteResource;
use crate::ecs::{EcsTags, EcsTaskDefinition, TaskDefinitionSweeper};
use crate::eks::EksTags;
use crate::glue::{ConnectionSweeper, GlueConnection, GlueTags, GlueWorkflow, WorkflowSweeper};
use crate::kafka::KafkaTags;
use crate::pinpoint::PinpointTags;
use crate::resourcegroups::ResourceGroupsTags;
use crate::servicequotas::ServiceQuotaDataSource;
use async_trait::async_trait;
use cloudrig_core::{
    ApplyResult, AuthStatus, CloudError, CloudProvider, ProjectState, Plan, ResourceRegistry,
    ResourceSet, ResourceState, Result, StateStore, SweeperRegistry, TagService, engine,
};
use std::path::Path;
use std::sync::Arc;

/// Every resource module and data source this crate provides.
pub fn registry(client: &AwsClient) -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    registry.register(Arc::new(GlueConnection::new(client.clone())));
    registry.register(Arc::new(GlueWorkflow::new(client.clone())));
    registry.register(Arc::new(EcsTaskDefinition::new(client.clone())));
    registry.register(Arc::new(LocalGatewayRouteResource::new(client.clone())));
    registry.register(Arc::new(DxHostedConnection::new(client.clone())));
    registry.register_data_source(Arc::new(ServiceQuotaDataSource::new(client.clone())));
    registry
}

pub fn sweepers(client: &AwsClient) -> SweeperRegistry {
    let mut sweepers = SweeperRegistry::new();
    sweepers.register(Arc::new(ConnectionSweeper::new(client.clone())));
    sweepers.register(Arc::new(WorkflowSweeper::new(client.clone())));
    sweepers.register(Arc::new(TaskDefinitionSweeper::new(client.clone())));
    sweepers
}

/// The tagging API serving the resource behind `arn`.
pub fn tag_service_for_arn(client: &AwsClient, arn: &str) -> Result<Box<dyn TagService>> {
    let parsed: Arn = arn.parse().map_err(CloudError::from)?;
    let service: Box<dyn TagService> = match parsed.service.as_str() {
        "directconnect" => Box::new(DirectConnectTags::new(client.directconnect.clone())),
        "ecs" => Box::new(EcsTags::new(client.ecs.clone())),
        "eks" => Box::new(EksTags::new(client.eks.clone())),
        "glue" => Box::new(GlueTags::new(client.glue.clone())),
        "kafka" => Box::new(KafkaTags::new(client.kafka.clone())),
        "mobiletargeting" => Box::new(PinpointTags::new(client.pinpoint.clone())),
        "resource-groups" => Box::new(ResourceGroupsTags::new(client.resourcegroups.clone())),
        other => {
            return Err(CloudError::UnsupportedResource(format!(
                "tagging for {other} resources ({arn})"
            )));
        }
    };
    Ok(service)
}

pub struct AwsProvider {
    client: AwsClient,
    registry: ResourceRegistry,
    state: StateStore,
}

impl AwsProvider {
    pub fn new(client: AwsClient, project_root: impl AsRef<Path>) -> Self {
        let registry = registry(&client);
        Self {
            client,
            registry,
            state: StateStore::new(project_root),
        }
    }

    pub fn client(&self) -> &AwsClient {
        &self.client
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Recorded state without contacting AWS
    pub async fn recorded_state(&self) -> Result<ProjectState> {
        self.state.load().await
    }

    /// Read a data source such as `aws_servicequotas_service_quota`.
    pub async fn read_data(
        &self,
        data_type: &str,
        config: &serde_json::Value,
    ) -> Result<ResourceState> {
        self.registry.data_source(data_type)?.read(config).await
    }
}

#[async_trait]
impl CloudProvider for AwsProvider {
    fn name(&self) -> &str {
        "aws"
    }

    fn display_name(&self) -> &str {
        "Amazon Web Services"
    }

    async fn check_auth(&self) -> Result<AuthStatus> {
        match self.client.caller_identity().await {
            Ok((account, arn)) => Ok(AuthStatus::ok(format!("{account} ({arn})"))),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn get_state(&self) -> Result<ProjectState> {
        let mut state = self.state.load().await?;
        let keys: Vec<String> = state.resources.keys().cloned().collect();

        for key in keys {
            let Some(recorded) = state.get_resource(&key).cloned() else {
                continue;
            };
            let module = self.registry.get(&recorded.resource_type)?;
            match module.refresh(&recorded).await? {
                Some(live) => state.set_resource(key, live.with_config(recorded.config)),
                None => {
                    tracing::warn!("{key} ({}) no longer exists", recorded.id);
                    state.remove_resource(&key);
                }
            }
        }
        Ok(state)
    }

    async fn plan(&self, desired: &ResourceSet) -> Result<Plan> {
        let state = self.state.load().await?;
        engine::plan(&self.registry, desired, &state, true).await
    }

    async fn apply(&self, plan: &Plan, desired: &ResourceSet) -> Result<ApplyResult> {
        let lock = self.state.lock().await?;
        let mut state = self.state.load().await?;

        let result = engine::apply(&self.registry, plan, desired, &mut state).await;

        self.state.save(&state).await?;
        lock.release().await?;
        Ok(result)
    }

    async fn destroy(&self, key: &str) -> Result<()> {
        let lock = self.state.lock().await?;
        let mut state = self.state.load().await?;

        let recorded = state
            .get_resource(key)
            .cloned()
            .ok_or_else(|| CloudError::StateError(format!("{key} is not recorded in state")))?;
        self.registry
            .get(&recorded.resource_type)?
            .delete(&recorded)
            .await?;
        state.remove_resource(key);
        tracing::info!("{key}: destruction complete [id={}]", recorded.id);

        self.state.save(&state).await?;
        lock.release().await
    }

    async fn destroy_all(&self) -> Result<ApplyResult> {
        let lock = self.state.lock().await?;
        let mut state = self.state.load().await?;

        let result = engine::destroy_all(&self.registry, &mut state).await;

        self.state.save(&state).await?;
        lock.release().await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::{BehaviorVersion, Region, SdkConfig};
    use cloudrig_config::ProviderConfig;

    fn client() -> AwsClient {
        let sdk = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-west-2"))
            .build();
        AwsClient::from_sdk_config(&sdk, &ProviderConfig::default(), "123456789012")
    }

    #[tokio::test]
    async fn test_registry_contents() {
        let registry = registry(&client());
        assert_eq!(
            registry.resource_types(),
            vec![
                "aws_dx_hosted_connection",
                "aws_ec2_local_gateway_route",
                "aws_ecs_task_definition",
                "aws_glue_connection",
                "aws_glue_workflow",
            ]
        );
        assert!(registry.data_source("aws_servicequotas_service_quota").is_ok());
        assert!(registry.get("aws_s3_bucket").is_err());
    }

    #[tokio::test]
    async fn test_sweeper_order() {
        let sweepers = sweepers(&client());
        assert_eq!(
            sweepers.names(),
            vec!["aws_ecs_task_definition", "aws_glue_connection", "aws_glue_workflow"]
        );
        let ordered = sweepers.ordered(&["aws_ecs_task_definition".to_string()]).unwrap();
        assert_eq!(ordered.len(), 1);
    }

    #[tokio::test]
    async fn test_tag_service_for_arn() {
        let client = client();
        for arn in [
            "arn:aws:glue:us-west-2:123456789012:workflow/wf",
            "arn:aws:ecs:us-west-2:123456789012:task-definition/web:3",
            "arn:aws:eks:us-west-2:123456789012:cluster/demo",
            "arn:aws:kafka:us-west-2:123456789012:cluster/demo/abc",
            "arn:aws:mobiletargeting:us-west-2:123456789012:apps/abc",
            "arn:aws:resource-groups:us-west-2:123456789012:group/g",
            "arn:aws:directconnect:us-west-2:123456789012:dxcon/dxcon-abc",
        ] {
            assert!(tag_service_for_arn(&client, arn).is_ok(), "{arn}");
        }

        let err = tag_service_for_arn(&client, "arn:aws:s3:::bucket").err().unwrap();
        assert!(matches!(err, CloudError::UnsupportedResource(_)));
        assert!(tag_service_for_arn(&client, "not-an-arn").is_err());
    }

    #[tokio::test]
    async fn test_recorded_state_empty() {
        let dir = tempfile::tempdir().unwrap();
        let provider = AwsProvider::new(client(), dir.path());
        assert_eq!(provider.name(), "aws");
        assert!(provider.recorded_state().await.unwrap().resources.is_empty());
        assert!(provider.destroy("aws_glue_workflow.missing").await.is_err());
    }
}
