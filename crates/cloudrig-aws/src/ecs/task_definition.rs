//! `aws_ecs_task_definition`
//!
//! A task definition is immutable once registered: every change other than
//! tags registers a new revision. The resource id is the family; the current
//! revision's ARN is kept in the `arn` attribute and is what gets deregistered.

use super::container_definitions::{self, ContainerDefinition};
use super::tags::{self as ecs_tags, EcsTags};
use crate::awserr::{build_error, codes, sdk_error};
use crate::conns::AwsClient;
use async_trait::async_trait;
use aws_sdk_ecs::types::{
    Compatibility, DockerVolumeConfiguration, EfsAuthorizationConfig, EfsAuthorizationConfigIam,
    EfsTransitEncryption, EfsVolumeConfiguration, EphemeralStorage,
    FSxWindowsFileServerAuthorizationConfig, FSxWindowsFileServerVolumeConfiguration,
    HostVolumeProperties, InferenceAccelerator, IpcMode, KeyValuePair, NetworkMode, PidMode,
    ProxyConfiguration, ProxyConfigurationType, Scope, Tag, TaskDefinition, TaskDefinitionField,
    TaskDefinitionPlacementConstraint, TaskDefinitionPlacementConstraintType,
    TaskDefinitionStatus, Volume,
};
use cloudrig_core::retry::retry_when_message_contains;
use cloudrig_core::sweep::{SweepReport, skip_sweep_error};
use cloudrig_core::{
    CloudError, KeyValueTags, ResourceConfig, ResourceModule, ResourceState, Result, Sweeper,
    update_tags,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

pub const RESOURCE_TYPE: &str = "aws_ecs_task_definition";

const NETWORK_MODES: &[&str] = &["bridge", "host", "awsvpc", "none"];
const IPC_MODES: &[&str] = &["host", "none", "task"];
const PID_MODES: &[&str] = &["host", "task"];
const COMPATIBILITIES: &[&str] = &["EC2", "FARGATE", "EXTERNAL"];
const MAX_PLACEMENT_CONSTRAINTS: usize = 10;
/// Fargate task storage, in GiB.
const EPHEMERAL_STORAGE_GIB: std::ops::RangeInclusive<i32> = 21..=200;
const ROLE_NOT_VALID: &str = "Role is not valid";

/// Everything but tags registers a new revision.
const FORCE_NEW: &[&str] = &[
    "family",
    "container_definitions",
    "task_role_arn",
    "execution_role_arn",
    "network_mode",
    "ipc_mode",
    "pid_mode",
    "cpu",
    "memory",
    "requires_compatibilities",
    "volume",
    "placement_constraints",
    "proxy_configuration",
    "inference_accelerator",
    "ephemeral_storage",
];

/// Message of the `ClientException` returned for a family with no active revision.
const NOT_FOUND_MESSAGE: &str = "Unable to describe task definition";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskDefinitionConfig {
    family: String,
    container_definitions: String,
    #[serde(default)]
    task_role_arn: Option<String>,
    #[serde(default)]
    execution_role_arn: Option<String>,
    #[serde(default)]
    network_mode: Option<String>,
    #[serde(default)]
    ipc_mode: Option<String>,
    #[serde(default)]
    pid_mode: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    cpu: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    memory: Option<String>,
    #[serde(default)]
    requires_compatibilities: Vec<String>,
    #[serde(default)]
    volume: Vec<VolumeBlock>,
    #[serde(default)]
    placement_constraints: Vec<PlacementConstraintBlock>,
    #[serde(default)]
    proxy_configuration: Vec<ProxyConfigurationBlock>,
    #[serde(default)]
    inference_accelerator: Vec<InferenceAcceleratorBlock>,
    #[serde(default)]
    ephemeral_storage: Vec<EphemeralStorageBlock>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

/// Task-level `cpu` and `memory` are strings in the API; accept either form.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Number(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::String(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct VolumeBlock {
    name: String,
    #[serde(default)]
    host_path: Option<String>,
    #[serde(default)]
    docker_volume_configuration: Vec<DockerVolumeBlock>,
    #[serde(default)]
    efs_volume_configuration: Vec<EfsVolumeBlock>,
    #[serde(default)]
    fsx_windows_file_server_volume_configuration: Vec<FsxWindowsVolumeBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DockerVolumeBlock {
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    autoprovision: Option<bool>,
    #[serde(default)]
    driver: Option<String>,
    #[serde(default)]
    driver_opts: BTreeMap<String, String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EfsVolumeBlock {
    file_system_id: String,
    #[serde(default)]
    root_directory: Option<String>,
    #[serde(default)]
    transit_encryption: Option<String>,
    #[serde(default)]
    transit_encryption_port: Option<i32>,
    #[serde(default)]
    authorization_config: Vec<AuthorizationConfigBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthorizationConfigBlock {
    #[serde(default)]
    access_point_id: Option<String>,
    #[serde(default)]
    iam: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FsxWindowsVolumeBlock {
    file_system_id: String,
    root_directory: String,
    authorization_config: Vec<FsxAuthorizationConfigBlock>,
}

/// `credentials_parameter` is a Secrets Manager or SSM parameter ARN holding
/// the domain user's credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FsxAuthorizationConfigBlock {
    credentials_parameter: String,
    domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EphemeralStorageBlock {
    size_in_gib: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlacementConstraintBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    expression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProxyConfigurationBlock {
    #[serde(rename = "type", default = "default_proxy_type")]
    kind: String,
    container_name: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

fn default_proxy_type() -> String {
    "APPMESH".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct InferenceAcceleratorBlock {
    device_name: String,
    device_type: String,
}

fn one_of(key: &str, attribute: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(CloudError::InvalidConfig(format!(
            "{key}: {attribute} must be one of {}, got {value}",
            allowed.join(", ")
        )))
    }
}

impl TaskDefinitionConfig {
    fn from_resource(config: &ResourceConfig) -> Result<Self> {
        let parsed: Self = config.parse()?;
        let key = config.key();

        let valid_family = !parsed.family.is_empty()
            && parsed.family.len() <= 255
            && parsed
                .family
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_family {
            return Err(CloudError::InvalidConfig(format!(
                "{key}: family must be 1 to 255 letters, numbers, hyphens or underscores"
            )));
        }

        container_definitions::validate(&parsed.container_definitions)
            .map_err(|e| e.context(key.clone()))?;

        if let Some(mode) = &parsed.network_mode {
            one_of(&key, "network_mode", mode, NETWORK_MODES)?;
        }
        if let Some(mode) = &parsed.ipc_mode {
            one_of(&key, "ipc_mode", mode, IPC_MODES)?;
        }
        if let Some(mode) = &parsed.pid_mode {
            one_of(&key, "pid_mode", mode, PID_MODES)?;
        }
        for compatibility in &parsed.requires_compatibilities {
            one_of(&key, "requires_compatibilities", compatibility, COMPATIBILITIES)?;
        }

        if parsed.placement_constraints.len() > MAX_PLACEMENT_CONSTRAINTS {
            return Err(CloudError::InvalidConfig(format!(
                "{key}: at most {MAX_PLACEMENT_CONSTRAINTS} placement_constraints are allowed"
            )));
        }
        for constraint in &parsed.placement_constraints {
            one_of(&key, "placement_constraints.type", &constraint.kind, &["memberOf"])?;
        }

        if parsed.proxy_configuration.len() > 1 {
            return Err(CloudError::InvalidConfig(format!(
                "{key}: at most one proxy_configuration block is allowed"
            )));
        }
        for proxy in &parsed.proxy_configuration {
            one_of(&key, "proxy_configuration.type", &proxy.kind, &["APPMESH"])?;
        }

        if parsed.ephemeral_storage.len() > 1 {
            return Err(CloudError::InvalidConfig(format!(
                "{key}: at most one ephemeral_storage block is allowed"
            )));
        }
        for storage in &parsed.ephemeral_storage {
            if !EPHEMERAL_STORAGE_GIB.contains(&storage.size_in_gib) {
                return Err(CloudError::InvalidConfig(format!(
                    "{key}: ephemeral_storage.size_in_gib must be between {} and {}, got {}",
                    EPHEMERAL_STORAGE_GIB.start(),
                    EPHEMERAL_STORAGE_GIB.end(),
                    storage.size_in_gib
                )));
            }
        }

        for volume in &parsed.volume {
            let blocks = [
                (
                    "docker_volume_configuration",
                    volume.docker_volume_configuration.len(),
                ),
                ("efs_volume_configuration", volume.efs_volume_configuration.len()),
                (
                    "fsx_windows_file_server_volume_configuration",
                    volume.fsx_windows_file_server_volume_configuration.len(),
                ),
            ];
            for (block, count) in blocks {
                if count > 1 {
                    return Err(CloudError::InvalidConfig(format!(
                        "{key}: volume {}: at most one {block} block is allowed",
                        volume.name
                    )));
                }
            }
            for docker in &volume.docker_volume_configuration {
                if let Some(scope) = &docker.scope {
                    one_of(
                        &key,
                        "docker_volume_configuration.scope",
                        scope,
                        &["shared", "task"],
                    )?;
                }
                if docker.autoprovision.is_some() && docker.scope.as_deref() != Some("shared") {
                    return Err(CloudError::InvalidConfig(format!(
                        "{key}: volume {}: autoprovision is only valid with scope \"shared\"",
                        volume.name
                    )));
                }
            }
            for efs in &volume.efs_volume_configuration {
                if let Some(encryption) = &efs.transit_encryption {
                    one_of(
                        &key,
                        "efs_volume_configuration.transit_encryption",
                        encryption,
                        &["ENABLED", "DISABLED"],
                    )?;
                }
                if efs.authorization_config.len() > 1 {
                    return Err(CloudError::InvalidConfig(format!(
                        "{key}: volume {}: at most one authorization_config block is allowed",
                        volume.name
                    )));
                }
            }
            for fsx in &volume.fsx_windows_file_server_volume_configuration {
                if fsx.authorization_config.len() != 1 {
                    return Err(CloudError::InvalidConfig(format!(
                        "{key}: volume {}: fsx_windows_file_server_volume_configuration needs \
                         exactly one authorization_config block",
                        volume.name
                    )));
                }
            }
        }

        Ok(parsed)
    }
}

fn non_empty_map(map: &BTreeMap<String, String>) -> Option<HashMap<String, String>> {
    if map.is_empty() {
        None
    } else {
        Some(map.clone().into_iter().collect())
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

fn sorted_map(map: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    map.map(|m| m.clone().into_iter().collect()).unwrap_or_default()
}

impl VolumeBlock {
    fn to_sdk(&self) -> Result<Volume> {
        let docker = self.docker_volume_configuration.first().map(|d| {
            DockerVolumeConfiguration::builder()
                .set_scope(d.scope.as_deref().map(Scope::from))
                .set_autoprovision(d.autoprovision)
                .set_driver(d.driver.clone())
                .set_driver_opts(non_empty_map(&d.driver_opts))
                .set_labels(non_empty_map(&d.labels))
                .build()
        });

        let efs = self
            .efs_volume_configuration
            .first()
            .map(|e| {
                let authorization = e.authorization_config.first().map(|a| {
                    EfsAuthorizationConfig::builder()
                        .set_access_point_id(a.access_point_id.clone())
                        .set_iam(a.iam.as_deref().map(EfsAuthorizationConfigIam::from))
                        .build()
                });
                EfsVolumeConfiguration::builder()
                    .file_system_id(&e.file_system_id)
                    .set_root_directory(e.root_directory.clone())
                    .set_transit_encryption(
                        e.transit_encryption.as_deref().map(EfsTransitEncryption::from),
                    )
                    .set_transit_encryption_port(e.transit_encryption_port)
                    .set_authorization_config(authorization)
                    .build()
                    .map_err(build_error)
            })
            .transpose()?;

        let fsx = self
            .fsx_windows_file_server_volume_configuration
            .first()
            .map(|f| {
                let authorization = f
                    .authorization_config
                    .first()
                    .map(|a| {
                        FSxWindowsFileServerAuthorizationConfig::builder()
                            .credentials_parameter(&a.credentials_parameter)
                            .domain(&a.domain)
                            .build()
                            .map_err(build_error)
                    })
                    .transpose()?;
                FSxWindowsFileServerVolumeConfiguration::builder()
                    .file_system_id(&f.file_system_id)
                    .root_directory(&f.root_directory)
                    .set_authorization_config(authorization)
                    .build()
                    .map_err(build_error)
            })
            .transpose()?;

        Ok(Volume::builder()
            .name(&self.name)
            .set_host(
                self.host_path
                    .as_ref()
                    .map(|path| HostVolumeProperties::builder().source_path(path).build()),
            )
            .set_docker_volume_configuration(docker)
            .set_efs_volume_configuration(efs)
            .set_fsx_windows_file_server_volume_configuration(fsx)
            .build())
    }

    fn from_sdk(volume: &Volume) -> Self {
        Self {
            name: volume.name().unwrap_or_default().to_string(),
            host_path: volume
                .host()
                .and_then(|h| h.source_path())
                .map(str::to_string),
            docker_volume_configuration: volume
                .docker_volume_configuration()
                .map(|d| DockerVolumeBlock {
                    scope: d.scope().map(|s| s.as_str().to_string()),
                    autoprovision: d.autoprovision(),
                    driver: d.driver().map(str::to_string),
                    driver_opts: sorted_map(d.driver_opts()),
                    labels: sorted_map(d.labels()),
                })
                .into_iter()
                .collect(),
            efs_volume_configuration: volume
                .efs_volume_configuration()
                .map(|e| EfsVolumeBlock {
                    file_system_id: e.file_system_id().to_string(),
                    root_directory: e.root_directory().map(str::to_string),
                    transit_encryption: e
                        .transit_encryption()
                        .map(|t| t.as_str().to_string()),
                    transit_encryption_port: e.transit_encryption_port(),
                    authorization_config: e
                        .authorization_config()
                        .map(|a| AuthorizationConfigBlock {
                            access_point_id: a.access_point_id().map(str::to_string),
                            iam: a.iam().map(|i| i.as_str().to_string()),
                        })
                        .into_iter()
                        .collect(),
                })
                .into_iter()
                .collect(),
            fsx_windows_file_server_volume_configuration: volume
                .fsx_windows_file_server_volume_configuration()
                .map(|f| FsxWindowsVolumeBlock {
                    file_system_id: f.file_system_id().to_string(),
                    root_directory: f.root_directory().to_string(),
                    authorization_config: f
                        .authorization_config()
                        .map(|a| FsxAuthorizationConfigBlock {
                            credentials_parameter: a.credentials_parameter().to_string(),
                            domain: a.domain().to_string(),
                        })
                        .into_iter()
                        .collect(),
                })
                .into_iter()
                .collect(),
        }
    }
}

pub struct EcsTaskDefinition {
    client: AwsClient,
    tags: EcsTags,
}

/// Describe a task definition by family, `family:revision` or ARN.
///
/// `None` when it does not exist or has been deregistered.
pub async fn find_task_definition(
    client: &aws_sdk_ecs::Client,
    id: &str,
) -> Result<Option<(TaskDefinition, Vec<Tag>)>> {
    let result = client
        .describe_task_definition()
        .task_definition(id)
        .include(TaskDefinitionField::Tags)
        .send()
        .await
        .map_err(sdk_error);

    let output = match result {
        Ok(output) => output,
        Err(e) if e.message_contains(codes::ECS_CLIENT_EXCEPTION, NOT_FOUND_MESSAGE) => {
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match output.task_definition() {
        Some(td) if is_inactive(td) => Ok(None),
        Some(td) => Ok(Some((td.clone(), output.tags().to_vec()))),
        None => Ok(None),
    }
}

fn is_inactive(td: &TaskDefinition) -> bool {
    matches!(
        td.status().map(|s| s.as_str()),
        Some("INACTIVE" | "DELETE_IN_PROGRESS")
    )
}

impl EcsTaskDefinition {
    pub fn new(client: AwsClient) -> Self {
        let tags = EcsTags::new(client.ecs.clone());
        Self { client, tags }
    }

    fn task_definition_state(&self, td: &TaskDefinition, tags: &[Tag]) -> Result<ResourceState> {
        let family = td.family().unwrap_or_default();

        let definitions: Vec<ContainerDefinition> = td
            .container_definitions()
            .iter()
            .map(ContainerDefinition::from_sdk)
            .collect();
        let volumes: Vec<VolumeBlock> = td.volumes().iter().map(VolumeBlock::from_sdk).collect();
        let constraints: Vec<PlacementConstraintBlock> = td
            .placement_constraints()
            .iter()
            .map(|c| PlacementConstraintBlock {
                kind: c.r#type().map(|t| t.as_str().to_string()).unwrap_or_default(),
                expression: c.expression().map(str::to_string),
            })
            .collect();
        let proxy: Vec<ProxyConfigurationBlock> = td
            .proxy_configuration()
            .map(|p| ProxyConfigurationBlock {
                kind: p
                    .r#type()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_else(default_proxy_type),
                container_name: p.container_name().to_string(),
                properties: p
                    .properties()
                    .iter()
                    .map(|kv| {
                        (
                            kv.name().unwrap_or_default().to_string(),
                            kv.value().unwrap_or_default().to_string(),
                        )
                    })
                    .collect(),
            })
            .into_iter()
            .collect();
        let accelerators: Vec<InferenceAcceleratorBlock> = td
            .inference_accelerators()
            .iter()
            .map(|a| InferenceAcceleratorBlock {
                device_name: a.device_name().to_string(),
                device_type: a.device_type().to_string(),
            })
            .collect();
        let storage: Vec<EphemeralStorageBlock> = td
            .ephemeral_storage()
            .map(|e| EphemeralStorageBlock {
                size_in_gib: e.size_in_gib(),
            })
            .into_iter()
            .collect();
        let compatibilities: Vec<&str> = td
            .requires_compatibilities()
            .iter()
            .map(|c| c.as_str())
            .collect();

        let remote = ecs_tags::key_value_tags(tags);
        let policy = &self.client.tag_policy;

        Ok(ResourceState::new(family, RESOURCE_TYPE)
            .with_attributes(json!({
                "arn": td.task_definition_arn(),
                "family": family,
                "revision": td.revision(),
                "container_definitions": container_definitions::to_json_string(&definitions)?,
                "task_role_arn": td.task_role_arn(),
                "execution_role_arn": td.execution_role_arn(),
                "network_mode": td.network_mode().map(|m| m.as_str()),
                "ipc_mode": td.ipc_mode().map(|m| m.as_str()),
                "pid_mode": td.pid_mode().map(|m| m.as_str()),
                "cpu": td.cpu(),
                "memory": td.memory(),
                "requires_compatibilities": compatibilities,
                "volume": volumes,
                "placement_constraints": constraints,
                "proxy_configuration": proxy,
                "inference_accelerator": accelerators,
                "ephemeral_storage": storage,
                "tags": policy.declared_view(&remote).to_json(),
                "tags_all": policy.remote_view(&remote).to_json(),
            })))
    }

    async fn register(&self, parsed: &TaskDefinitionConfig) -> Result<TaskDefinition> {
        let definitions = container_definitions::parse(&parsed.container_definitions)?
            .iter()
            .map(ContainerDefinition::to_sdk)
            .collect::<Result<Vec<_>>>()?;

        let volumes = parsed
            .volume
            .iter()
            .map(VolumeBlock::to_sdk)
            .collect::<Result<Vec<_>>>()?;

        let constraints: Vec<TaskDefinitionPlacementConstraint> = parsed
            .placement_constraints
            .iter()
            .map(|c| {
                TaskDefinitionPlacementConstraint::builder()
                    .r#type(TaskDefinitionPlacementConstraintType::from(c.kind.as_str()))
                    .set_expression(c.expression.clone())
                    .build()
            })
            .collect();

        let proxy = parsed
            .proxy_configuration
            .first()
            .map(|p| {
                let properties = p
                    .properties
                    .iter()
                    .map(|(k, v)| KeyValuePair::builder().name(k).value(v).build())
                    .collect();
                ProxyConfiguration::builder()
                    .r#type(ProxyConfigurationType::from(p.kind.as_str()))
                    .container_name(&p.container_name)
                    .set_properties(Some(properties))
                    .build()
                    .map_err(build_error)
            })
            .transpose()?;

        let accelerators = parsed
            .inference_accelerator
            .iter()
            .map(|a| {
                InferenceAccelerator::builder()
                    .device_name(&a.device_name)
                    .device_type(&a.device_type)
                    .build()
                    .map_err(build_error)
            })
            .collect::<Result<Vec<_>>>()?;

        let storage = parsed
            .ephemeral_storage
            .first()
            .map(|e| EphemeralStorage::builder().size_in_gib(e.size_in_gib).build());

        let tags = self
            .client
            .tag_policy
            .resolve(&KeyValueTags::from(parsed.tags.clone()));

        tracing::debug!("Registering ECS Task Definition: {}", parsed.family);
        let request = self
            .client
            .ecs
            .register_task_definition()
            .family(&parsed.family)
            .set_container_definitions(Some(definitions))
            .set_task_role_arn(parsed.task_role_arn.clone())
            .set_execution_role_arn(parsed.execution_role_arn.clone())
            .set_network_mode(parsed.network_mode.as_deref().map(NetworkMode::from))
            .set_ipc_mode(parsed.ipc_mode.as_deref().map(IpcMode::from))
            .set_pid_mode(parsed.pid_mode.as_deref().map(PidMode::from))
            .set_cpu(parsed.cpu.clone())
            .set_memory(parsed.memory.clone())
            .set_requires_compatibilities(if parsed.requires_compatibilities.is_empty() {
                None
            } else {
                Some(
                    parsed
                        .requires_compatibilities
                        .iter()
                        .map(|c| Compatibility::from(c.as_str()))
                        .collect(),
                )
            })
            .set_volumes(non_empty(volumes))
            .set_placement_constraints(non_empty(constraints))
            .set_proxy_configuration(proxy)
            .set_inference_accelerators(non_empty(accelerators))
            .set_ephemeral_storage(storage)
            .set_tags(non_empty(ecs_tags::tags(&tags)));

        // A freshly created task or execution role may not be visible to ECS yet.
        let output = retry_when_message_contains(
            &self.client.retry,
            || {
                let request = request.clone();
                async move { request.send().await.map_err(sdk_error) }
            },
            "ClientException",
            ROLE_NOT_VALID,
        )
        .await
        .map_err(|e| {
            e.context(format!(
                "error registering ECS Task Definition ({})",
                parsed.family
            ))
        })?;

        output.task_definition().cloned().ok_or_else(|| {
            CloudError::ResourceNotFound(format!(
                "ECS Task Definition ({}): RegisterTaskDefinition returned no task definition",
                parsed.family
            ))
        })
    }
}

#[async_trait]
impl ResourceModule for EcsTaskDefinition {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn force_new_attributes(&self) -> &[&str] {
        FORCE_NEW
    }

    async fn create(&self, config: &ResourceConfig) -> Result<ResourceState> {
        let parsed = TaskDefinitionConfig::from_resource(config)?;
        let registered = self.register(&parsed).await?;
        let arn = registered.task_definition_arn().unwrap_or_default().to_string();
        tracing::info!("Registered ECS Task Definition {arn}");

        match find_task_definition(&self.client.ecs, &arn).await? {
            Some((td, tags)) => self.task_definition_state(&td, &tags),
            None => Err(CloudError::ResourceNotFound(format!("ECS Task Definition ({arn})"))),
        }
    }

    async fn read(&self, id: &str) -> Result<Option<ResourceState>> {
        match find_task_definition(&self.client.ecs, id).await? {
            Some((td, tags)) => Ok(Some(self.task_definition_state(&td, &tags)?)),
            None => {
                tracing::warn!("ECS Task Definition ({id}) not found");
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        prior: &ResourceState,
        config: &ResourceConfig,
    ) -> Result<ResourceState> {
        let parsed = TaskDefinitionConfig::from_resource(config)?;
        let arn: String = prior
            .get_attribute("arn")
            .ok_or_else(|| CloudError::StateError(format!("{}: arn not recorded", prior.id)))?;

        let old_tags = KeyValueTags::from_json(prior.attributes.get("tags_all"));
        let new_tags = self
            .client
            .tag_policy
            .resolve(&KeyValueTags::from(parsed.tags.clone()));
        update_tags(&self.tags, &arn, &old_tags, &new_tags)
            .await
            .map_err(|e| {
                e.context(format!(
                    "error updating tags for ECS Task Definition ({arn})"
                ))
            })?;

        match find_task_definition(&self.client.ecs, &arn).await? {
            Some((td, tags)) => self.task_definition_state(&td, &tags),
            None => Err(CloudError::ResourceNotFound(format!("ECS Task Definition ({arn})"))),
        }
    }

    async fn delete(&self, state: &ResourceState) -> Result<()> {
        let arn = match state.get_attribute::<String>("arn") {
            Some(arn) => arn,
            None => match find_task_definition(&self.client.ecs, &state.id).await? {
                Some((td, _)) => td.task_definition_arn().unwrap_or_default().to_string(),
                None => return Ok(()),
            },
        };
        deregister(&self.client.ecs, &arn).await
    }
}

/// Deregister one revision. A revision that is already inactive is not an error.
pub async fn deregister(client: &aws_sdk_ecs::Client, arn: &str) -> Result<()> {
    tracing::debug!("Deregistering ECS Task Definition: {arn}");
    let result = client
        .deregister_task_definition()
        .task_definition(arn)
        .send()
        .await
        .map_err(sdk_error);

    match result {
        Ok(_) => Ok(()),
        Err(e) if e.code_equals(codes::ECS_CLIENT_EXCEPTION) => {
            if find_task_definition(client, arn).await?.is_none() {
                Ok(())
            } else {
                Err(e.context(format!("error deleting ECS Task Definition ({arn})")))
            }
        }
        Err(e) => Err(e.context(format!("error deleting ECS Task Definition ({arn})"))),
    }
}

pub struct TaskDefinitionSweeper {
    client: AwsClient,
}

impl TaskDefinitionSweeper {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Sweeper for TaskDefinitionSweeper {
    fn name(&self) -> &str {
        RESOURCE_TYPE
    }

    fn dependencies(&self) -> &[&str] {
        &["aws_ecs_service"]
    }

    async fn sweep(&self, region: &str) -> Result<SweepReport> {
        let mut report = SweepReport::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = match self
                .client
                .ecs
                .list_task_definitions()
                .status(TaskDefinitionStatus::Active)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_error)
            {
                Ok(page) => page,
                Err(e) if skip_sweep_error(&e) => {
                    tracing::warn!("Skipping ECS Task Definitions sweep for {region}: {e}");
                    return Ok(report);
                }
                Err(e) => return Err(e.context("error retrieving ECS Task Definitions")),
            };

            for arn in page.task_definition_arns() {
                tracing::info!("Deleting ECS Task Definition: {arn}");
                let outcome = deregister(&self.client.ecs, arn).await;
                report.record(arn.clone(), outcome);
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

    const DEFINITIONS: &str =
        r#"[{"name": "sleep", "image": "busybox", "command": ["sleep", "360"], "memory": 10}]"#;

    fn resource(config: serde_json::Value) -> ResourceConfig {
        ResourceConfig::new(RESOURCE_TYPE, "test", config)
    }

    #[test]
    fn test_parse_fargate_config() {
        let parsed = TaskDefinitionConfig::from_resource(&resource(json!({
            "family": "tf-acc-td-fargate",
            "network_mode": "awsvpc",
            "requires_compatibilities": ["FARGATE"],
            "cpu": 256,
            "memory": "512",
            "container_definitions": DEFINITIONS,
        })))
        .unwrap();

        assert_eq!(parsed.cpu.as_deref(), Some("256"));
        assert_eq!(parsed.memory.as_deref(), Some("512"));
        assert_eq!(parsed.requires_compatibilities, vec!["FARGATE"]);
    }

    #[test]
    fn test_invalid_family() {
        let err = TaskDefinitionConfig::from_resource(&resource(json!({
            "family": "has spaces",
            "container_definitions": DEFINITIONS,
        })))
        .unwrap_err();
        assert!(err.to_string().contains("family"));
    }

    #[test]
    fn test_invalid_container_definitions() {
        let err = TaskDefinitionConfig::from_resource(&resource(json!({
            "family": "td",
            "container_definitions": r#"[{"name": "x", "command": "sleep 360"}]"#,
        })))
        .unwrap_err();
        assert!(err.to_string().contains("command must be an array of strings"));
    }

    #[test]
    fn test_invalid_modes() {
        let invalid = [
            ("network_mode", "overlay"),
            ("ipc_mode", "shared"),
            ("pid_mode", "none"),
        ];
        for (attr, value) in invalid {
            let err = TaskDefinitionConfig::from_resource(&resource(json!({
                "family": "td",
                "container_definitions": DEFINITIONS,
                attr: value,
            })))
            .unwrap_err();
            assert!(err.to_string().contains(attr), "{attr}: {err}");
        }
    }

    #[test]
    fn test_autoprovision_requires_shared_scope() {
        let err = TaskDefinitionConfig::from_resource(&resource(json!({
            "family": "td",
            "container_definitions": DEFINITIONS,
            "volume": [{
                "name": "db",
                "docker_volume_configuration": [{"scope": "task", "autoprovision": true}],
            }],
        })))
        .unwrap_err();
        assert!(err.to_string().contains("autoprovision"));
    }

    #[test]
    fn test_volume_round_trip_through_sdk() {
        let block = VolumeBlock {
            name: "vol".to_string(),
            host_path: None,
            docker_volume_configuration: vec![],
            efs_volume_configuration: vec![EfsVolumeBlock {
                file_system_id: "fs-12345678".to_string(),
                root_directory: Some("/home/test".to_string()),
                transit_encryption: Some("ENABLED".to_string()),
                transit_encryption_port: Some(2999),
                authorization_config: vec![AuthorizationConfigBlock {
                    access_point_id: Some("fsap-12345678".to_string()),
                    iam: Some("ENABLED".to_string()),
                }],
            }],
            fsx_windows_file_server_volume_configuration: vec![],
        };

        let sdk = block.to_sdk().unwrap();
        assert_eq!(sdk.name(), Some("vol"));
        assert_eq!(VolumeBlock::from_sdk(&sdk), block);
    }

    #[test]
    fn test_docker_volume_from_sdk() {
        let block = VolumeBlock {
            name: "vol".to_string(),
            host_path: None,
            docker_volume_configuration: vec![DockerVolumeBlock {
                scope: Some("shared".to_string()),
                autoprovision: Some(true),
                driver: Some("local".to_string()),
                driver_opts: BTreeMap::from([("uid".to_string(), "1000".to_string())]),
                labels: BTreeMap::from([("stack".to_string(), "april".to_string())]),
            }],
            efs_volume_configuration: vec![],
            fsx_windows_file_server_volume_configuration: vec![],
        };

        let flattened =
            serde_json::to_value(VolumeBlock::from_sdk(&block.to_sdk().unwrap())).unwrap();
        assert_eq!(flattened["docker_volume_configuration"][0]["scope"], "shared");
        assert_eq!(
            flattened["docker_volume_configuration"][0]["labels"]["stack"],
            "april"
        );
    }

    #[test]
    fn test_fsx_windows_volume() {
        let parsed = TaskDefinitionConfig::from_resource(&resource(json!({
            "family": "td",
            "container_definitions": DEFINITIONS,
            "volume": [{
                "name": "fsx",
                "fsx_windows_file_server_volume_configuration": [{
                    "file_system_id": "fs-0123456789abcdef0",
                    "root_directory": "\\data",
                    "authorization_config": [{
                        "credentials_parameter": "arn:aws:ssm:us-west-2:123456789012:parameter/fsx",
                        "domain": "corp.example.com",
                    }],
                }],
            }],
        })))
        .unwrap();

        let block = &parsed.volume[0];
        let sdk = block.to_sdk().unwrap();
        let fsx = sdk.fsx_windows_file_server_volume_configuration().unwrap();
        assert_eq!(fsx.root_directory(), "\\data");
        assert_eq!(
            fsx.authorization_config().unwrap().domain(),
            "corp.example.com"
        );
        assert_eq!(&VolumeBlock::from_sdk(&sdk), block);
    }

    #[test]
    fn test_fsx_windows_volume_requires_authorization() {
        let err = TaskDefinitionConfig::from_resource(&resource(json!({
            "family": "td",
            "container_definitions": DEFINITIONS,
            "volume": [{
                "name": "fsx",
                "fsx_windows_file_server_volume_configuration": [{
                    "file_system_id": "fs-0123456789abcdef0",
                    "root_directory": "\\data",
                    "authorization_config": [],
                }],
            }],
        })))
        .unwrap_err();
        assert!(err.to_string().contains("authorization_config"));
    }

    #[test]
    fn test_ephemeral_storage() {
        let parsed = TaskDefinitionConfig::from_resource(&resource(json!({
            "family": "td",
            "requires_compatibilities": ["FARGATE"],
            "network_mode": "awsvpc",
            "cpu": 256,
            "memory": 512,
            "ephemeral_storage": [{"size_in_gib": 30}],
            "container_definitions": DEFINITIONS,
        })))
        .unwrap();
        assert_eq!(
            parsed.ephemeral_storage,
            vec![EphemeralStorageBlock { size_in_gib: 30 }]
        );

        for size in [20, 201] {
            let err = TaskDefinitionConfig::from_resource(&resource(json!({
                "family": "td",
                "ephemeral_storage": [{"size_in_gib": size}],
                "container_definitions": DEFINITIONS,
            })))
            .unwrap_err();
            assert!(err.to_string().contains("size_in_gib"), "{size}: {err}");
        }
    }

    #[test]
    fn test_every_attribute_but_tags_forces_new() {
        let config = json!({
            "family": "td",
            "container_definitions": DEFINITIONS,
            "task_role_arn": "arn:aws:iam::123456789012:role/task",
            "execution_role_arn": "arn:aws:iam::123456789012:role/exec",
            "network_mode": "awsvpc",
            "ipc_mode": "host",
            "pid_mode": "host",
            "cpu": "256",
            "memory": "512",
            "requires_compatibilities": ["FARGATE"],
            "volume": [{"name": "vol", "host_path": "/host/vol"}],
            "placement_constraints": [{
                "type": "memberOf",
                "expression": "attribute:ecs.availability-zone in [us-west-2a]",
            }],
            "proxy_configuration": [{"container_name": "web", "properties": {"AppPorts": "80"}}],
            "inference_accelerator": [{"device_name": "device_1", "device_type": "eia1.medium"}],
            "ephemeral_storage": [{"size_in_gib": 30}],
            "tags": {"Name": "td"},
        });
        TaskDefinitionConfig::from_resource(&resource(config.clone())).unwrap();

        for key in config.as_object().unwrap().keys() {
            assert_eq!(FORCE_NEW.contains(&key.as_str()), key != "tags", "{key}");
        }
    }
}
