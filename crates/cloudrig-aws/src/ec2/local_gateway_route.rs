//! `aws_ec2_local_gateway_route`

use crate::awserr::{codes, sdk_error};
use crate::conns::AwsClient;
use async_trait::async_trait;
use aws_sdk_ec2::types::{Filter, LocalGatewayRoute};
use cloudrig_core::{
    CloudError, Refreshed, ResourceConfig, ResourceModule, ResourceState, ResourceStatus, Result,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const RESOURCE_TYPE: &str = "aws_ec2_local_gateway_route";

const STATE_ACTIVE: &str = "active";
const STATE_BLACKHOLE: &str = "blackhole";
const STATE_DELETED: &str = "deleted";
const STATE_DELETING: &str = "deleting";
const STATE_PENDING: &str = "pending";

const ROUTE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// `<route_table_id>_<destination_cidr_block>`
pub fn encode_route_id(route_table_id: &str, destination: &str) -> String {
    format!("{route_table_id}_{destination}")
}

pub fn decode_route_id(id: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = id.split('_').collect();
    match parts.as_slice() {
        [table, destination] if !table.is_empty() && !destination.is_empty() => {
            Ok((table.to_string(), destination.to_string()))
        }
        _ => Err(CloudError::InvalidId {
            id: id.to_string(),
            reason: "expected TABLEID_DESTINATION".to_string(),
        }),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteConfig {
    destination_cidr_block: String,
    local_gateway_route_table_id: String,
    local_gateway_virtual_interface_group_id: String,
}

/// The route to `destination` in a local gateway route table.
///
/// `None` when no route matches or the route table itself is gone.
pub async fn find_local_gateway_route(
    client: &aws_sdk_ec2::Client,
    route_table_id: &str,
    destination: &str,
) -> Result<Option<LocalGatewayRoute>> {
    let filter = Filter::builder()
        .name("route-search.exact-match")
        .values(destination)
        .build();

    let mut next_token: Option<String> = None;
    loop {
        let result = client
            .search_local_gateway_routes()
            .local_gateway_route_table_id(route_table_id)
            .filters(filter.clone())
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(sdk_error);

        let page = match result {
            Ok(page) => page,
            Err(e) if e.code_equals(codes::EC2_ROUTE_TABLE_NOT_FOUND) => return Ok(None),
            Err(e) => return Err(e),
        };

        let found = page
            .routes()
            .iter()
            .find(|r| r.destination_cidr_block() == Some(destination));
        if let Some(route) = found {
            return Ok(Some(route.clone()));
        }

        match page.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
            _ => return Ok(None),
        }
    }
}

async fn route_status(
    client: &aws_sdk_ec2::Client,
    route_table_id: &str,
    destination: &str,
) -> Result<Refreshed<LocalGatewayRoute>> {
    Ok(find_local_gateway_route(client, route_table_id, destination)
        .await?
        .map(|route| {
            let state = route
                .state()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default();
            (route, state)
        }))
}

pub struct LocalGatewayRouteResource {
    client: AwsClient,
}

impl LocalGatewayRouteResource {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }
}

fn route_state(route: &LocalGatewayRoute, route_table_id: &str) -> ResourceState {
    let destination = route.destination_cidr_block().unwrap_or_default();
    let raw_state = route.state().map(|s| s.as_str()).unwrap_or(STATE_PENDING);
    let status = ResourceStatus::classify(raw_state, &[STATE_ACTIVE], &[STATE_PENDING]);

    ResourceState::new(encode_route_id(route_table_id, destination), RESOURCE_TYPE)
        .with_remote_status(raw_state, status)
        .with_attributes(json!({
            "destination_cidr_block": destination,
            "local_gateway_route_table_id": route
                .local_gateway_route_table_id()
                .unwrap_or(route_table_id),
            "local_gateway_virtual_interface_group_id": route
                .local_gateway_virtual_interface_group_id(),
        }))
}

#[async_trait]
impl ResourceModule for LocalGatewayRouteResource {
    fn resource_type(&self) -> &str {
        RESOURCE_TYPE
    }

    fn force_new_attributes(&self) -> &[&str] {
        &[
            "destination_cidr_block",
            "local_gateway_route_table_id",
            "local_gateway_virtual_interface_group_id",
        ]
    }

    async fn create(&self, config: &ResourceConfig) -> Result<ResourceState> {
        let parsed: RouteConfig = config.parse()?;
        let id = encode_route_id(
            &parsed.local_gateway_route_table_id,
            &parsed.destination_cidr_block,
        );

        tracing::debug!("Creating EC2 Local Gateway Route: {id}");
        self.client
            .ec2
            .create_local_gateway_route()
            .destination_cidr_block(&parsed.destination_cidr_block)
            .local_gateway_route_table_id(&parsed.local_gateway_route_table_id)
            .local_gateway_virtual_interface_group_id(
                &parsed.local_gateway_virtual_interface_group_id,
            )
            .send()
            .await
            .map_err(|e| {
                sdk_error(e).context(format!("error creating EC2 Local Gateway Route ({id})"))
            })?;

        let ec2 = &self.client.ec2;
        let (table, destination) = (
            parsed.local_gateway_route_table_id.as_str(),
            parsed.destination_cidr_block.as_str(),
        );
        let route = self
            .client
            .state_change(|| route_status(ec2, table, destination), ROUTE_TIMEOUT)
            .pending(&[STATE_PENDING])
            .target(&[STATE_ACTIVE])
            .wait_for_state()
            .await
            .map_err(|e| {
                e.context(format!(
                    "error waiting for EC2 Local Gateway Route ({id}) to become available"
                ))
            })?
            .ok_or_else(|| {
                CloudError::ResourceNotFound(format!("EC2 Local Gateway Route ({id})"))
            })?;

        Ok(route_state(&route, table))
    }

    async fn read(&self, id: &str) -> Result<Option<ResourceState>> {
        let (table, destination) = decode_route_id(id)?;
        let route = find_local_gateway_route(&self.client.ec2, &table, &destination)
            .await
            .map_err(|e| e.context(format!("error reading EC2 Local Gateway Route ({id})")))?;

        match route {
            Some(route) if route.state().map(|s| s.as_str()) != Some(STATE_DELETED) => {
                Ok(Some(route_state(&route, &table)))
            }
            _ => {
                tracing::warn!("EC2 Local Gateway Route ({id}) not found");
                Ok(None)
            }
        }
    }

    async fn update(
        &self,
        prior: &ResourceState,
        _config: &ResourceConfig,
    ) -> Result<ResourceState> {
        self.read(&prior.id).await?.ok_or_else(|| {
            CloudError::ResourceNotFound(format!("EC2 Local Gateway Route ({})", prior.id))
        })
    }

    async fn delete(&self, state: &ResourceState) -> Result<()> {
        let (table, destination) = decode_route_id(&state.id)?;

        tracing::debug!("Deleting EC2 Local Gateway Route: {}", state.id);
        let result = self
            .client
            .ec2
            .delete_local_gateway_route()
            .local_gateway_route_table_id(&table)
            .destination_cidr_block(&destination)
            .send()
            .await
            .map_err(sdk_error);

        match result {
            Ok(_) => {}
            Err(e) if e.code_equals(codes::EC2_ROUTE_TABLE_NOT_FOUND) => return Ok(()),
            Err(e) => {
                return Err(e.context(format!(
                    "error deleting EC2 Local Gateway Route ({})",
                    state.id
                )));
            }
        }

        let ec2 = &self.client.ec2;
        self.client
            .state_change(|| route_status(ec2, &table, &destination), ROUTE_TIMEOUT)
            .pending(&[STATE_ACTIVE, STATE_BLACKHOLE, STATE_DELETING])
            .target(&[STATE_DELETED])
            .not_found_checks(0)
            .wait_for_state()
            .await
            .map(|_| ())
            .or_else(|e| match e {
                CloudError::NotFoundAfterRetries { .. } => Ok(()),
                e => Err(e.context(format!(
                    "error waiting for EC2 Local Gateway Route ({}) to delete",
                    state.id
                ))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::LocalGatewayRouteState;

    #[test]
    fn test_route_id() {
        let id = encode_route_id("lgw-rtb-0123456789abcdef0", "172.16.0.0/24");
        assert_eq!(id, "lgw-rtb-0123456789abcdef0_172.16.0.0/24");
        assert_eq!(
            decode_route_id(&id).unwrap(),
            ("lgw-rtb-0123456789abcdef0".to_string(), "172.16.0.0/24".to_string())
        );
    }

    #[test]
    fn test_malformed_route_ids() {
        for id in ["", "lgw-rtb-1", "_172.16.0.0/24", "lgw-rtb-1_", "a_b_c"] {
            assert!(
                matches!(decode_route_id(id), Err(CloudError::InvalidId { .. })),
                "{id} should not decode"
            );
        }
    }

    #[test]
    fn test_config_requires_all_attributes() {
        let config = ResourceConfig::new(
            RESOURCE_TYPE,
            "test",
            json!({
                "destination_cidr_block": "172.16.1.0/24",
                "local_gateway_route_table_id": "lgw-rtb-1",
            }),
        );
        assert!(config.parse::<RouteConfig>().is_err());
    }

    #[test]
    fn test_blackhole_route_is_impaired() {
        let route = LocalGatewayRoute::builder()
            .destination_cidr_block("172.16.1.0/24")
            .local_gateway_virtual_interface_group_id("lgw-vif-grp-1")
            .state(LocalGatewayRouteState::Blackhole)
            .build();

        let state = route_state(&route, "lgw-rtb-1");
        assert_eq!(state.id, "lgw-rtb-1_172.16.1.0/24");
        assert_eq!(state.status, ResourceStatus::Impaired);
        assert_eq!(state.remote_status.as_deref(), Some(STATE_BLACKHOLE));
        assert_eq!(state.attributes["local_gateway_route_table_id"], json!("lgw-rtb-1"));

        let active = LocalGatewayRoute::builder()
            .destination_cidr_block("172.16.1.0/24")
            .state(LocalGatewayRouteState::Active)
            .build();
        assert_eq!(route_state(&active, "lgw-rtb-1").status, ResourceStatus::Active);
    }
}
