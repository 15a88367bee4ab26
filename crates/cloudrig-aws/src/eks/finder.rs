//! EKS lookups
//!
//! Every finder returns `Ok(None)` for `ResourceNotFoundException`.

use crate::awserr::{build_error, codes, not_found_as_none, sdk_error};
use aws_sdk_eks::Client;
use aws_sdk_eks::types::{
    Addon, Cluster, FargateProfile, IdentityProviderConfig, Nodegroup, OidcIdentityProviderConfig,
    Update,
};
use cloudrig_core::{CloudError, Result};

pub const OIDC_CONFIG_TYPE: &str = "oidc";

fn not_found<T>(result: std::result::Result<T, CloudError>) -> Result<Option<T>> {
    not_found_as_none(result, &[codes::EKS_RESOURCE_NOT_FOUND])
}

pub async fn find_cluster_by_name(client: &Client, name: &str) -> Result<Option<Cluster>> {
    let output = client
        .describe_cluster()
        .name(name)
        .send()
        .await
        .map_err(sdk_error);
    Ok(not_found(output)?.and_then(|o| o.cluster().cloned()))
}

pub async fn find_cluster_update_by_name_and_id(
    client: &Client,
    name: &str,
    id: &str,
) -> Result<Option<Update>> {
    let output = client
        .describe_update()
        .name(name)
        .update_id(id)
        .send()
        .await
        .map_err(sdk_error);
    Ok(not_found(output)?.and_then(|o| o.update().cloned()))
}

pub async fn find_addon_by_cluster_name_and_addon_name(
    client: &Client,
    cluster_name: &str,
    addon_name: &str,
) -> Result<Option<Addon>> {
    let output = client
        .describe_addon()
        .cluster_name(cluster_name)
        .addon_name(addon_name)
        .send()
        .await
        .map_err(sdk_error);
    Ok(not_found(output)?.and_then(|o| o.addon().cloned()))
}

pub async fn find_addon_update_by_cluster_name_addon_name_and_id(
    client: &Client,
    cluster_name: &str,
    addon_name: &str,
    id: &str,
) -> Result<Option<Update>> {
    let output = client
        .describe_update()
        .name(cluster_name)
        .addon_name(addon_name)
        .update_id(id)
        .send()
        .await
        .map_err(sdk_error);
    Ok(not_found(output)?.and_then(|o| o.update().cloned()))
}

pub async fn find_fargate_profile_by_cluster_name_and_profile_name(
    client: &Client,
    cluster_name: &str,
    profile_name: &str,
) -> Result<Option<FargateProfile>> {
    let output = client
        .describe_fargate_profile()
        .cluster_name(cluster_name)
        .fargate_profile_name(profile_name)
        .send()
        .await
        .map_err(sdk_error);
    Ok(not_found(output)?.and_then(|o| o.fargate_profile().cloned()))
}

pub async fn find_nodegroup_by_cluster_name_and_nodegroup_name(
    client: &Client,
    cluster_name: &str,
    nodegroup_name: &str,
) -> Result<Option<Nodegroup>> {
    let output = client
        .describe_nodegroup()
        .cluster_name(cluster_name)
        .nodegroup_name(nodegroup_name)
        .send()
        .await
        .map_err(sdk_error);
    Ok(not_found(output)?.and_then(|o| o.nodegroup().cloned()))
}

pub async fn find_nodegroup_update_by_cluster_name_nodegroup_name_and_id(
    client: &Client,
    cluster_name: &str,
    nodegroup_name: &str,
    id: &str,
) -> Result<Option<Update>> {
    let output = client
        .describe_update()
        .name(cluster_name)
        .nodegroup_name(nodegroup_name)
        .update_id(id)
        .send()
        .await
        .map_err(sdk_error);
    Ok(not_found(output)?.and_then(|o| o.update().cloned()))
}

pub async fn find_oidc_identity_provider_config_by_cluster_name_and_config_name(
    client: &Client,
    cluster_name: &str,
    config_name: &str,
) -> Result<Option<OidcIdentityProviderConfig>> {
    let config = IdentityProviderConfig::builder()
        .r#type(OIDC_CONFIG_TYPE)
        .name(config_name)
        .build()
        .map_err(build_error)?;

    let output = client
        .describe_identity_provider_config()
        .cluster_name(cluster_name)
        .identity_provider_config(config)
        .send()
        .await
        .map_err(sdk_error);
    Ok(not_found(output)?.and_then(|o| {
        o.identity_provider_config()
            .and_then(|c| c.oidc())
            .cloned()
    }))
}
