//! `aws_dx_hosted_connection`
//!
//! Allocated by a Direct Connect partner on one of its interconnects or LAGs
//! for another account. The parent `connection_id` is not returned by the
//! API, so it is only known from the configuration the connection was
//! allocated with.

use super::tags::{self as dx_tags, DirectConnectTags};
use crate::awserr::{codes, sdk_error};
use crate::conns::AwsClient;
use async_trait::async_trait;
use aws_sdk_directconnect::types::Connection;
use cloudrig_core::{
    CloudError, KeyValueTags, Refreshed, ResourceConfig, ResourceModule, ResourceState,
    ResourceStatus, Result, TagService, update_tags,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

pub const RESOURCE_TYPE: &str = "aws_dx_hosted_connection";

const NOT_FOUND_MESSAGE: &str = "Could not find Connection with ID";

const BANDWIDTHS: &[&str] = &[
    "50Mbps", "100Mbps", "200Mbps", "300Mbps", "400Mbps", "500Mbps", "1Gbps", "2Gbps", "5Gbps",
    "10Gbps", "25Gbps",
];

const DELETE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

const AVAILABLE_STATES: &[&str] = &["available"];
const PENDING_STATES: &[&str] = &["ordering", "requested", "pending"];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct HostedConnectionConfig {
    name: String,
    connection_id: String,
    owner_account_id: String,
    bandwidth: String,
    vlan: i32,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

impl HostedConnectionConfig {
    fn from_resource(config: &ResourceConfig) -> Result<Self> {
        let parsed: Self = config.parse()?;
        let key = config.key();

        if !BANDWIDTHS.contains(&parsed.bandwidth.as_str()) {
            return Err(CloudError::InvalidConfig(format!(
                "{key}: bandwidth must be one of {}, got {}",
                BANDWIDTHS.join(", "),
                parsed.bandwidth
            )));
        }
        if !(1..=4094).contains(&parsed.vlan) {
            return Err(CloudError::InvalidConfig(format!(
                "{key}: vlan must be between 1 and 4094, got {}",
                parsed.vlan
            )));
        }
        let valid_account = parsed.owner_account_id.len() == 12
            && parsed.owner_account_id.chars().all(|c| c.is_ascii_digit());
        if !valid_account {
            return Err(CloudError::InvalidConfig(format!(
                "{key}: owner_account_id must be a 12 digit AWS account id"
            )));
        }
        Ok(parsed)
    }
}

/// The hosted connection with this id.
///
/// Connections in state `deleted` or `rejected` count as not found.
pub async fn find_hosted_connection_by_id(
    client: &aws_sdk_directconnect::Client,
    id: &str,
) -> Result<Option<Connection>> {
    let result = client
        .describe_hosted_connections()
        .connection_id(id)
        .send()
        .await
        .map_err(sdk_error);

    let output = match result {
        Ok(output) => output,
        Err(e) if e.message_contains(codes::DX_CLIENT_EXCEPTION, NOT_FOUND_MESSAGE) => {
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let connections = output.connections();
    if connections.len() > 1 {
        return Err(CloudError::Api {
            code: None,
            message: format!(
                "found {} Direct Connect Hosted Connections for {id}, expected 1",
                connections.len()
            ),
        });
    }

    Ok(connections
        .first()
        .filter(|c| {
            !matches!(
                c.connection_state().map(|s| s.as_str()),
                Some("deleted" | "rejected")
            )
        })
        .cloned())
}

/// Refresh for the state poller.
pub async fn hosted_connection_state(
    client: &aws_sdk_directconnect::Client,
    id: &str,
) -> Result<Refreshed<Connection>> {
    Ok(find_hosted_connection_by_id(client, id).await?.map(|c| {
        let state = c
            .connection_state()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        (c, state)
    }))
}

pub struct DxHostedConnection {
    client: AwsClient,
    tags: DirectConnectTags,
}

impl DxHostedConnection {
    pub fn new(client: AwsClient) -> Self {
        let tags = DirectConnectTags::new(client.directconnect.clone());
        Self { client, tags }
    }

    fn arn(&self, id: &str) -> String {
        self.client.regional_arn("directconnect", &format!("dxcon/{id}"))
    }

    async fn find_existing(&self, id: &str) -> Result<Connection> {
        find_hosted_connection_by_id(&self.client.directconnect, id)
            .await?
            .ok_or_else(|| {
                CloudError::ResourceNotFound(format!("Direct Connect Hosted Connection ({id})"))
            })
    }

    async fn connection_state(
        &self,
        connection: &Connection,
        parent: Option<&str>,
    ) -> Result<ResourceState> {
        let id = connection.connection_id().unwrap_or_default();
        let arn = self.arn(id);

        let remote = self.tags.list_tags(&arn).await.map_err(|e| {
            e.context(format!(
                "error listing tags for Direct Connect Hosted Connection ({id})"
            ))
        })?;
        let policy = &self.client.tag_policy;

        let raw_state = connection
            .connection_state()
            .map(|s| s.as_str())
            .unwrap_or("unknown");
        let status = ResourceStatus::classify(raw_state, AVAILABLE_STATES, PENDING_STATES);

        let state = ResourceState::new(id, RESOURCE_TYPE)
            .with_remote_status(raw_state, status)
            .with_attributes(json!({
                "arn": arn,
                "name": connection.connection_name(),
                "owner_account_id": connection.owner_account(),
                "bandwidth": connection.bandwidth(),
                "vlan": connection.vlan(),
                "state": connection.connection_state().map(|s| s.as_str()),
                "aws_device": connection.aws_device_v2(),
                "has_logical_redundancy": connection
                    .has_logical_redundancy()
                    .map(|h| h.as_str()),
                "jumbo_frame_capable": connection.jumbo_frame_capable(),
                "lag_id": connection.lag_id(),
                "location": connection.location(),
                "partner_name": connection.partner_name(),
                "provider_name": connection.provider_name(),
                "region": connection.region(),
                "tags": policy.declared_view(&remote).to_json(),
                "tags_all": policy.remote_view(&remote).to_json(),
            })));
        Ok(match parent {
            Some(parent) => state.with_attribute("connection_id", json!(parent)),
            None => state,
        })
    }
}

/// The parent interconnect or LAG a recorded connection was allocated on.
fn recorded_parent(prior: &ResourceState) -> Option<String> {
    prior
        .get_attribute::<String>("connection_id")
        .or_else(|| {
            prior
                .config
                .get("connection_id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
}

#[async_trait]
impl ResourceModule for DxHostedConnection {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn force_new_attributes(&self) -> &[&str] {
        &["name", "connection_id", "owner_account_id", "bandwidth", "vlan"]
    }

    /// Not returned by DescribeHostedConnections.
    fn write_only_attributes(&self) -> &[&str] {
        &["connection_id"]
    }

    async fn create(&self, config: &ResourceConfig) -> Result<ResourceState> {
        let parsed = HostedConnectionConfig::from_resource(config)?;
        let tags = self
            .client
            .tag_policy
            .resolve(&KeyValueTags::from(parsed.tags.clone()));

        tracing::debug!("Creating Direct Connect Hosted Connection: {}", parsed.name);
        let output = self
            .client
            .directconnect
            .allocate_hosted_connection()
            .connection_id(&parsed.connection_id)
            .owner_account(&parsed.owner_account_id)
            .bandwidth(&parsed.bandwidth)
            .connection_name(&parsed.name)
            .vlan(parsed.vlan)
            .set_tags(if tags.is_empty() {
                None
            } else {
                Some(dx_tags::tags(&tags)?)
            })
            .send()
            .await
            .map_err(|e| {
                sdk_error(e).context(format!(
                    "error creating Direct Connect Hosted Connection ({})",
                    parsed.name
                ))
            })?;

        let id = output.connection_id().unwrap_or_default().to_string();
        tracing::info!("Allocated Direct Connect Hosted Connection {id}");

        let connection = self.find_existing(&id).await?;
        self.connection_state(&connection, Some(&parsed.connection_id)).await
    }

    async fn read(&self, id: &str) -> Result<Option<ResourceState>> {
        match find_hosted_connection_by_id(&self.client.directconnect, id).await? {
            Some(connection) => Ok(Some(self.connection_state(&connection, None).await?)),
            None => {
                tracing::warn!("Direct Connect Hosted Connection ({id}) not found");
                Ok(None)
            }
        }
    }

    async fn refresh(&self, prior: &ResourceState) -> Result<Option<ResourceState>> {
        let Some(connection) =
            find_hosted_connection_by_id(&self.client.directconnect, &prior.id).await?
        else {
            tracing::warn!("Direct Connect Hosted Connection ({}) not found", prior.id);
            return Ok(None);
        };
        let parent = recorded_parent(prior);
        Ok(Some(self.connection_state(&connection, parent.as_deref()).await?))
    }

    async fn update(
        &self,
        prior: &ResourceState,
        config: &ResourceConfig,
    ) -> Result<ResourceState> {
        let parsed = HostedConnectionConfig::from_resource(config)?;
        let id = prior.id.as_str();

        let old_tags = KeyValueTags::from_json(prior.attributes.get("tags_all"));
        let new_tags = self
            .client
            .tag_policy
            .resolve(&KeyValueTags::from(parsed.tags.clone()));
        update_tags(&self.tags, &self.arn(id), &old_tags, &new_tags)
            .await
            .map_err(|e| {
                e.context(format!(
                    "error updating tags for Direct Connect Hosted Connection ({id})"
                ))
            })?;

        let connection = self.find_existing(id).await?;
        self.connection_state(&connection, Some(&parsed.connection_id)).await
    }

    async fn delete(&self, state: &ResourceState) -> Result<()> {
        delete_connection(&self.client, &state.id).await
    }
}

/// Delete a connection and wait until it is gone.
pub async fn delete_connection(client: &AwsClient, id: &str) -> Result<()> {
    tracing::debug!("Deleting Direct Connect Hosted Connection: {id}");
    let result = client
        .directconnect
        .delete_connection()
        .connection_id(id)
        .send()
        .await
        .map_err(sdk_error);

    match result {
        Ok(_) => {}
        Err(e) if e.message_contains(codes::DX_CLIENT_EXCEPTION, NOT_FOUND_MESSAGE) => {
            return Ok(());
        }
        Err(e) => {
            return Err(e.context(format!(
                "error deleting Direct Connect Hosted Connection ({id})"
            )));
        }
    }

    let dx = &client.directconnect;
    client
        .state_change(|| hosted_connection_state(dx, id), DELETE_TIMEOUT)
        .pending(&["requested", "pending", "available", "ordering", "down", "deleting"])
        .target(&[])
        .delay(Duration::from_secs(10))
        .min_timeout(Duration::from_secs(5))
        .wait_for_state()
        .await
        .map(|_| ())
        .map_err(|e| {
            e.context(format!(
                "error waiting for Direct Connect Hosted Connection ({id}) delete"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(config: serde_json::Value) -> ResourceConfig {
        ResourceConfig::new(RESOURCE_TYPE, "test", config)
    }

    fn valid() -> serde_json::Value {
        json!({
            "name": "tf-dx-abcde",
            "connection_id": "dxcon-fgabcdef",
            "owner_account_id": "123456789012",
            "bandwidth": "100Mbps",
            "vlan": 4094,
        })
    }

    #[test]
    fn test_parse_config() {
        let parsed = HostedConnectionConfig::from_resource(&resource(valid())).unwrap();
        assert_eq!(parsed.vlan, 4094);
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_invalid_configs() {
        let mut bad_vlan = valid();
        bad_vlan["vlan"] = json!(4095);
        assert!(
            HostedConnectionConfig::from_resource(&resource(bad_vlan))
                .unwrap_err()
                .to_string()
                .contains("vlan")
        );

        let mut bad_bandwidth = valid();
        bad_bandwidth["bandwidth"] = json!("100Gbps");
        assert!(HostedConnectionConfig::from_resource(&resource(bad_bandwidth)).is_err());

        let mut bad_owner = valid();
        bad_owner["owner_account_id"] = json!("12345");
        assert!(HostedConnectionConfig::from_resource(&resource(bad_owner)).is_err());
    }

    #[test]
    fn test_recorded_parent() {
        let from_attributes = ResourceState::new("dxcon-fg5678gh", RESOURCE_TYPE)
            .with_attribute("connection_id", json!("dxcon-fgabcdef"));
        assert_eq!(recorded_parent(&from_attributes).as_deref(), Some("dxcon-fgabcdef"));

        // state written before the attribute was recorded still has the config
        let from_config = ResourceState::new("dxcon-fg5678gh", RESOURCE_TYPE).with_config(valid());
        assert_eq!(recorded_parent(&from_config).as_deref(), Some("dxcon-fgabcdef"));

        assert!(recorded_parent(&ResourceState::new("dxcon-fg5678gh", RESOURCE_TYPE)).is_none());
    }
}
