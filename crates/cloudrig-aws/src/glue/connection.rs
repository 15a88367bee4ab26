//! `aws_glue_connection`

use crate::arn::Arn;
use crate::awserr::{build_error, codes, not_found_as_none, sdk_error};
use crate::conns::AwsClient;
use async_trait::async_trait;
use aws_sdk_glue::types::{
    Connection, ConnectionInput, ConnectionPropertyKey, ConnectionType,
    PhysicalConnectionRequirements,
};
use cloudrig_core::sweep::SweepReport;
use cloudrig_core::{CloudError, ResourceConfig, ResourceModule, ResourceState, Result, Sweeper};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

pub const RESOURCE_TYPE: &str = "aws_glue_connection";

const CONNECTION_TYPES: &[&str] = &[
    "CUSTOM",
    "JDBC",
    "KAFKA",
    "MARKETPLACE",
    "MONGODB",
    "NETWORK",
    "SFTP",
];

/// Resource id for a connection in a catalog.
pub fn encode_connection_id(catalog_id: &str, name: &str) -> String {
    format!("{catalog_id}:{name}")
}

/// Split a `catalog_id:name` resource id.
pub fn decode_connection_id(id: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = id.split(':').collect();
    match parts.as_slice() {
        [catalog_id, name] if !catalog_id.is_empty() && !name.is_empty() => {
            Ok((catalog_id.to_string(), name.to_string()))
        }
        _ => Err(CloudError::InvalidId {
            id: id.to_string(),
            reason: "expected CATALOG-ID:NAME".to_string(),
        }),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConnectionConfig {
    #[serde(default)]
    catalog_id: Option<String>,
    name: String,
    #[serde(default = "default_connection_type")]
    connection_type: String,
    #[serde(default)]
    connection_properties: BTreeMap<String, String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    match_criteria: Vec<String>,
    #[serde(default)]
    physical_connection_requirements: Vec<PhysicalConnectionRequirementsBlock>,
}

fn default_connection_type() -> String {
    "JDBC".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PhysicalConnectionRequirementsBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    availability_zone: Option<String>,
    #[serde(default)]
    security_group_id_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subnet_id: Option<String>,
}

impl ConnectionConfig {
    fn from_resource(config: &ResourceConfig) -> Result<Self> {
        let parsed: Self = config.parse()?;
        if parsed.name.is_empty() {
            return Err(CloudError::InvalidConfig(format!(
                "{}: attribute \"name\" is required",
                config.key()
            )));
        }
        if !CONNECTION_TYPES.contains(&parsed.connection_type.as_str()) {
            return Err(CloudError::InvalidConfig(format!(
                "{}: connection_type must be one of {}, got {}",
                config.key(),
                CONNECTION_TYPES.join(", "),
                parsed.connection_type
            )));
        }
        if parsed.physical_connection_requirements.len() > 1 {
            return Err(CloudError::InvalidConfig(format!(
                "{}: at most one physical_connection_requirements block is allowed",
                config.key()
            )));
        }
        Ok(parsed)
    }

    fn input(&self) -> Result<ConnectionInput> {
        let properties: HashMap<ConnectionPropertyKey, String> = self
            .connection_properties
            .iter()
            .map(|(k, v)| (ConnectionPropertyKey::from(k.as_str()), v.clone()))
            .collect();

        let requirements = self.physical_connection_requirements.first().map(|p| {
            PhysicalConnectionRequirements::builder()
                .set_availability_zone(p.availability_zone.clone())
                .set_security_group_id_list(Some(p.security_group_id_list.clone()))
                .set_subnet_id(p.subnet_id.clone())
                .build()
        });

        ConnectionInput::builder()
            .name(&self.name)
            .connection_type(ConnectionType::from(self.connection_type.as_str()))
            .set_connection_properties(Some(properties))
            .set_description(self.description.clone())
            .set_match_criteria(if self.match_criteria.is_empty() {
                None
            } else {
                Some(self.match_criteria.clone())
            })
            .set_physical_connection_requirements(requirements)
            .build()
            .map_err(build_error)
    }
}

pub struct GlueConnection {
    client: AwsClient,
}

impl GlueConnection {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    /// The connection, or `None` when the catalog has no such connection.
    pub async fn find(&self, catalog_id: &str, name: &str) -> Result<Option<Connection>> {
        let result = self
            .client
            .glue
            .get_connection()
            .catalog_id(catalog_id)
            .name(name)
            .hide_password(false)
            .send()
            .await
            .map_err(sdk_error);

        Ok(not_found_as_none(result, &[codes::GLUE_ENTITY_NOT_FOUND])?
            .and_then(|output| output.connection().cloned()))
    }

    fn connection_state(&self, catalog_id: &str, connection: &Connection) -> ResourceState {
        let name = connection.name().unwrap_or_default();
        let arn = Arn::new(
            self.client.partition.clone(),
            "glue",
            self.client.region.clone(),
            catalog_id,
            format!("connection/{name}"),
        );

        let properties: BTreeMap<String, String> = connection
            .connection_properties()
            .map(|props| {
                props
                    .iter()
                    .map(|(k, v)| (k.as_str().to_string(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let requirements: Vec<PhysicalConnectionRequirementsBlock> = connection
            .physical_connection_requirements()
            .map(|p| PhysicalConnectionRequirementsBlock {
                availability_zone: p.availability_zone().map(str::to_string),
                security_group_id_list: p.security_group_id_list().to_vec(),
                subnet_id: p.subnet_id().map(str::to_string),
            })
            .filter(|p| *p != PhysicalConnectionRequirementsBlock::default())
            .into_iter()
            .collect();

        ResourceState::new(encode_connection_id(catalog_id, name), RESOURCE_TYPE)
            .with_attributes(json!({
                "arn": arn.to_string(),
                "catalog_id": catalog_id,
                "name": name,
                "connection_type": connection.connection_type().map(|t| t.as_str()),
                "connection_properties": properties,
                "description": connection.description(),
                "match_criteria": connection.match_criteria(),
                "physical_connection_requirements": requirements,
            }))
    }

    async fn read_state(&self, catalog_id: &str, name: &str) -> Result<ResourceState> {
        self.find(catalog_id, name)
            .await?
            .map(|c| self.connection_state(catalog_id, &c))
            .ok_or_else(|| {
                let id = encode_connection_id(catalog_id, name);
                CloudError::ResourceNotFound(format!("Glue Connection ({id})"))
            })
    }

    fn catalog_id(&self, config: &ConnectionConfig) -> String {
        config
            .catalog_id
            .clone()
            .unwrap_or_else(|| self.client.account_id.clone())
    }
}

#[async_trait]
impl ResourceModule for GlueConnection {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn force_new_attributes(&self) -> &[&str] {
        &["catalog_id", "name"]
    }

    async fn create(&self, config: &ResourceConfig) -> Result<ResourceState> {
        let parsed = ConnectionConfig::from_resource(config)?;
        let catalog_id = self.catalog_id(&parsed);

        tracing::debug!("Creating Glue Connection: {}", parsed.name);
        self.client
            .glue
            .create_connection()
            .catalog_id(&catalog_id)
            .connection_input(parsed.input()?)
            .send()
            .await
            .map_err(|e| {
                sdk_error(e).context(format!("error creating Glue Connection ({})", parsed.name))
            })?;

        self.read_state(&catalog_id, &parsed.name).await
    }

    async fn read(&self, id: &str) -> Result<Option<ResourceState>> {
        let (catalog_id, name) = decode_connection_id(id)?;
        Ok(self
            .find(&catalog_id, &name)
            .await?
            .map(|c| self.connection_state(&catalog_id, &c)))
    }

    async fn update(
        &self,
        prior: &ResourceState,
        config: &ResourceConfig,
    ) -> Result<ResourceState> {
        let parsed = ConnectionConfig::from_resource(config)?;
        let (catalog_id, name) = decode_connection_id(&prior.id)?;

        tracing::debug!("Updating Glue Connection: {}", prior.id);
        self.client
            .glue
            .update_connection()
            .catalog_id(&catalog_id)
            .name(&name)
            .connection_input(parsed.input()?)
            .send()
            .await
            .map_err(|e| {
                sdk_error(e).context(format!("error updating Glue Connection ({})", prior.id))
            })?;

        self.read_state(&catalog_id, &name).await
    }

    async fn delete(&self, state: &ResourceState) -> Result<()> {
        let (catalog_id, name) = decode_connection_id(&state.id)?;
        delete_connection(&self.client.glue, &catalog_id, &name).await
    }
}

/// Delete a connection; one that is already gone is not an error.
pub async fn delete_connection(
    client: &aws_sdk_glue::Client,
    catalog_id: &str,
    name: &str,
) -> Result<()> {
    tracing::debug!("Deleting Glue Connection: {catalog_id}:{name}");
    let result = client
        .delete_connection()
        .catalog_id(catalog_id)
        .connection_name(name)
        .send()
        .await
        .map_err(sdk_error);

    not_found_as_none(result, &[codes::GLUE_ENTITY_NOT_FOUND])
        .map(|_| ())
        .map_err(|e| e.context(format!("error deleting Glue Connection ({catalog_id}:{name})")))
}

/// Deletes every connection in the account's catalog.
pub struct ConnectionSweeper {
    client: AwsClient,
}

impl ConnectionSweeper {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Sweeper for ConnectionSweeper {
    fn name(&self) -> &str {
        RESOURCE_TYPE
    }

    async fn sweep(&self, region: &str) -> Result<SweepReport> {
        let catalog_id = self.client.account_id.as_str();
        let mut report = SweepReport::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .client
                .glue
                .get_connections()
                .catalog_id(catalog_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    sdk_error(e).context(format!("error retrieving Glue Connections in {region}"))
                })?;

            for connection in page.connection_list() {
                let Some(name) = connection.name() else {
                    continue;
                };
                let outcome = delete_connection(&self.client.glue, catalog_id, name).await;
                report.record(encode_connection_id(catalog_id, name), outcome);
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

    #[test]
    fn test_connection_id_round_trip() {
        let id = encode_connection_id("123456789012", "my-conn");
        assert_eq!(id, "123456789012:my-conn");
        let (catalog_id, name) = decode_connection_id(&id).unwrap();
        assert_eq!(catalog_id, "123456789012");
        assert_eq!(name, "my-conn");
    }

    #[test]
    fn test_decode_malformed_ids() {
        for id in ["my-conn", "a:b:c", ":name", "catalog:"] {
            let err = decode_connection_id(id).unwrap_err();
            assert!(
                matches!(err, CloudError::InvalidId { .. }),
                "expected InvalidId for {id}"
            );
        }
    }

    fn resource(config: serde_json::Value) -> ResourceConfig {
        ResourceConfig::new(RESOURCE_TYPE, "test", config)
    }

    #[test]
    fn test_config_defaults_to_jdbc() {
        let parsed = ConnectionConfig::from_resource(&resource(json!({
            "name": "conn",
            "connection_properties": {
                "JDBC_CONNECTION_URL": "jdbc:mysql://localhost/testdb",
                "PASSWORD": "testpassword",
                "USERNAME": "testusername",
            },
        })))
        .unwrap();
        assert_eq!(parsed.connection_type, "JDBC");

        let input = parsed.input().unwrap();
        assert!(input.match_criteria().is_empty());
        assert!(input.physical_connection_requirements().is_none());
    }

    #[test]
    fn test_network_connection_input() {
        let parsed = ConnectionConfig::from_resource(&resource(json!({
            "name": "conn",
            "connection_type": "NETWORK",
            "match_criteria": ["criteria1", "criteria2"],
            "physical_connection_requirements": [{
                "availability_zone": "us-west-2a",
                "security_group_id_list": ["sg-123"],
                "subnet_id": "subnet-123",
            }],
        })))
        .unwrap();

        let input = parsed.input().unwrap();
        assert_eq!(input.match_criteria(), ["criteria1", "criteria2"]);
        let requirements = input.physical_connection_requirements().unwrap();
        assert_eq!(requirements.subnet_id(), Some("subnet-123"));
        assert_eq!(requirements.security_group_id_list(), ["sg-123"]);
    }

    #[test]
    fn test_invalid_configs() {
        let bad_type = ConnectionConfig::from_resource(&resource(json!({
            "name": "conn",
            "connection_type": "FTP",
        })));
        assert!(bad_type.unwrap_err().to_string().contains("connection_type must be one of"));

        let two_blocks = ConnectionConfig::from_resource(&resource(json!({
            "name": "conn",
            "physical_connection_requirements": [{}, {}],
        })));
        assert!(two_blocks.unwrap_err().to_string().contains("at most one"));

        let unknown = ConnectionConfig::from_resource(&resource(json!({
            "name": "conn",
            "conection_type": "JDBC",
        })));
        assert!(matches!(unknown, Err(CloudError::InvalidConfig(_))));
    }
}
