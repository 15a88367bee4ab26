//! EKS refresh functions for the state poller

use super::finder::*;
use aws_sdk_eks::Client;
use aws_sdk_eks::types::{
    Addon, Cluster, FargateProfile, Nodegroup, OidcIdentityProviderConfig, Update,
};
use cloudrig_core::{Refreshed, Result};

fn refreshed<T>(found: Option<T>, status: impl Fn(&T) -> Option<&str>) -> Refreshed<T> {
    found.map(|value| {
        let status = status(&value).unwrap_or_default().to_string();
        (value, status)
    })
}

pub async fn status_cluster(client: &Client, name: &str) -> Result<Refreshed<Cluster>> {
    let found = find_cluster_by_name(client, name).await?;
    Ok(refreshed(found, |c| c.status().map(|s| s.as_str())))
}

pub async fn status_cluster_update(
    client: &Client,
    name: &str,
    id: &str,
) -> Result<Refreshed<Update>> {
    let found = find_cluster_update_by_name_and_id(client, name, id).await?;
    Ok(refreshed(found, |u| u.status().map(|s| s.as_str())))
}

pub async fn status_addon(
    client: &Client,
    cluster_name: &str,
    addon_name: &str,
) -> Result<Refreshed<Addon>> {
    let found =
        find_addon_by_cluster_name_and_addon_name(client, cluster_name, addon_name).await?;
    Ok(refreshed(found, |a| a.status().map(|s| s.as_str())))
}

pub async fn status_addon_update(
    client: &Client,
    cluster_name: &str,
    addon_name: &str,
    id: &str,
) -> Result<Refreshed<Update>> {
    let found =
        find_addon_update_by_cluster_name_addon_name_and_id(client, cluster_name, addon_name, id)
            .await?;
    Ok(refreshed(found, |u| u.status().map(|s| s.as_str())))
}

pub async fn status_fargate_profile(
    client: &Client,
    cluster_name: &str,
    profile_name: &str,
) -> Result<Refreshed<FargateProfile>> {
    let found =
        find_fargate_profile_by_cluster_name_and_profile_name(client, cluster_name, profile_name)
            .await?;
    Ok(refreshed(found, |p| p.status().map(|s| s.as_str())))
}

pub async fn status_nodegroup(
    client: &Client,
    cluster_name: &str,
    nodegroup_name: &str,
) -> Result<Refreshed<Nodegroup>> {
    let found =
        find_nodegroup_by_cluster_name_and_nodegroup_name(client, cluster_name, nodegroup_name)
            .await?;
    Ok(refreshed(found, |n| n.status().map(|s| s.as_str())))
}

pub async fn status_nodegroup_update(
    client: &Client,
    cluster_name: &str,
    nodegroup_name: &str,
    id: &str,
) -> Result<Refreshed<Update>> {
    let found = find_nodegroup_update_by_cluster_name_nodegroup_name_and_id(
        client,
        cluster_name,
        nodegroup_name,
        id,
    )
    .await?;
    Ok(refreshed(found, |u| u.status().map(|s| s.as_str())))
}

pub async fn status_oidc_identity_provider_config(
    client: &Client,
    cluster_name: &str,
    config_name: &str,
) -> Result<Refreshed<OidcIdentityProviderConfig>> {
    let found = find_oidc_identity_provider_config_by_cluster_name_and_config_name(
        client,
        cluster_name,
        config_name,
    )
    .await?;
    Ok(refreshed(found, |c| c.status().map(|s| s.as_str())))
}
