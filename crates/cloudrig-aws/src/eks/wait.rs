//! EKS waiters

use super::status::*;
use crate::conns::AwsClient;
use aws_sdk_eks::types::{
    Addon, AddonStatus, Cluster, ClusterStatus, ConfigStatus, FargateProfile, FargateProfileStatus,
    Nodegroup, NodegroupStatus, OidcIdentityProviderConfig, Update, UpdateStatus,
};
use cloudrig_core::{CloudError, Result};
use std::time::Duration;

pub const CLUSTER_CREATED_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const CLUSTER_DELETED_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const CLUSTER_UPDATE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const ADDON_CREATED_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const ADDON_DELETED_TIMEOUT: Duration = Duration::from_secs(40 * 60);
pub const ADDON_UPDATE_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const FARGATE_PROFILE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const NODEGROUP_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const OIDC_CONFIG_TIMEOUT: Duration = Duration::from_secs(40 * 60);

fn missing(what: &str, id: &str) -> CloudError {
    CloudError::ResourceNotFound(format!("{what} ({id})"))
}

/// `Successful` passes through; `Failed` and `Cancelled` become an error
/// carrying the update's error details.
pub fn update_outcome(update: Update) -> Result<Update> {
    match update.status() {
        Some(UpdateStatus::Failed) | Some(UpdateStatus::Cancelled) => {
            let details: Vec<String> = update
                .errors()
                .iter()
                .map(|e| {
                    format!(
                        "{}: {}",
                        e.error_code().map(|c| c.as_str()).unwrap_or("Unknown"),
                        e.error_message().unwrap_or_default()
                    )
                })
                .collect();
            Err(CloudError::Api {
                code: None,
                message: format!(
                    "EKS update ({}) {}: {}",
                    update.id().unwrap_or_default(),
                    update.status().map(|s| s.as_str()).unwrap_or_default(),
                    details.join("; ")
                ),
            })
        }
        _ => Ok(update),
    }
}

fn issues_error(what: &str, id: &str, status: &str, issues: Vec<String>) -> CloudError {
    CloudError::UnexpectedState {
        state: format!("{status} ({what} {id}: {})", issues.join("; ")),
        expected: "ACTIVE".to_string(),
    }
}

pub async fn wait_cluster_created(client: &AwsClient, name: &str) -> Result<Cluster> {
    let eks = &client.eks;
    client
        .state_change(|| status_cluster(eks, name), CLUSTER_CREATED_TIMEOUT)
        .pending(&[ClusterStatus::Creating.as_str()])
        .target(&[ClusterStatus::Active.as_str()])
        .wait_for_state()
        .await?
        .ok_or_else(|| missing("EKS Cluster", name))
}

pub async fn wait_cluster_deleted(client: &AwsClient, name: &str) -> Result<()> {
    let eks = &client.eks;
    client
        .state_change(|| status_cluster(eks, name), CLUSTER_DELETED_TIMEOUT)
        .pending(&[
            ClusterStatus::Active.as_str(),
            ClusterStatus::Creating.as_str(),
            ClusterStatus::Deleting.as_str(),
        ])
        .target(&[])
        .wait_for_state()
        .await
        .map(|_| ())
}

pub async fn wait_cluster_update_successful(
    client: &AwsClient,
    name: &str,
    id: &str,
) -> Result<Update> {
    let eks = &client.eks;
    let update = client
        .state_change(|| status_cluster_update(eks, name, id), CLUSTER_UPDATE_TIMEOUT)
        .pending(&[UpdateStatus::InProgress.as_str()])
        .target(&[
            UpdateStatus::Successful.as_str(),
            UpdateStatus::Failed.as_str(),
            UpdateStatus::Cancelled.as_str(),
        ])
        .wait_for_state()
        .await?
        .ok_or_else(|| missing("EKS Cluster update", id))?;
    update_outcome(update)
}

pub async fn wait_addon_created(
    client: &AwsClient,
    cluster_name: &str,
    addon_name: &str,
) -> Result<Addon> {
    let eks = &client.eks;
    let id = format!("{cluster_name}:{addon_name}");
    let addon = client
        .state_change(|| status_addon(eks, cluster_name, addon_name), ADDON_CREATED_TIMEOUT)
        .pending(&[AddonStatus::Creating.as_str()])
        .target(&[AddonStatus::Active.as_str(), AddonStatus::CreateFailed.as_str()])
        .wait_for_state()
        .await?
        .ok_or_else(|| missing("EKS Add-On", &id))?;

    if addon.status() == Some(&AddonStatus::CreateFailed) {
        let issues = addon
            .health()
            .map(|h| {
                h.issues()
                    .iter()
                    .map(|i| {
                        format!(
                            "{}: {}",
                            i.code().map(|c| c.as_str()).unwrap_or("Unknown"),
                            i.message().unwrap_or_default()
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        return Err(issues_error("EKS Add-On", &id, AddonStatus::CreateFailed.as_str(), issues));
    }
    Ok(addon)
}

pub async fn wait_addon_deleted(
    client: &AwsClient,
    cluster_name: &str,
    addon_name: &str,
) -> Result<()> {
    let eks = &client.eks;
    client
        .state_change(|| status_addon(eks, cluster_name, addon_name), ADDON_DELETED_TIMEOUT)
        .pending(&[AddonStatus::Active.as_str(), AddonStatus::Deleting.as_str()])
        .target(&[])
        .wait_for_state()
        .await
        .map(|_| ())
}

pub async fn wait_addon_update_successful(
    client: &AwsClient,
    cluster_name: &str,
    addon_name: &str,
    id: &str,
) -> Result<Update> {
    let eks = &client.eks;
    let update = client
        .state_change(
            || status_addon_update(eks, cluster_name, addon_name, id),
            ADDON_UPDATE_TIMEOUT,
        )
        .pending(&[UpdateStatus::InProgress.as_str()])
        .target(&[
            UpdateStatus::Successful.as_str(),
            UpdateStatus::Failed.as_str(),
            UpdateStatus::Cancelled.as_str(),
        ])
        .wait_for_state()
        .await?
        .ok_or_else(|| missing("EKS Add-On update", id))?;
    update_outcome(update)
}

pub async fn wait_fargate_profile_created(
    client: &AwsClient,
    cluster_name: &str,
    profile_name: &str,
) -> Result<FargateProfile> {
    let eks = &client.eks;
    client
        .state_change(
            || status_fargate_profile(eks, cluster_name, profile_name),
            FARGATE_PROFILE_TIMEOUT,
        )
        .pending(&[FargateProfileStatus::Creating.as_str()])
        .target(&[FargateProfileStatus::Active.as_str()])
        .wait_for_state()
        .await?
        .ok_or_else(|| missing("EKS Fargate Profile", &format!("{cluster_name}:{profile_name}")))
}

pub async fn wait_fargate_profile_deleted(
    client: &AwsClient,
    cluster_name: &str,
    profile_name: &str,
) -> Result<()> {
    let eks = &client.eks;
    client
        .state_change(
            || status_fargate_profile(eks, cluster_name, profile_name),
            FARGATE_PROFILE_TIMEOUT,
        )
        .pending(&[
            FargateProfileStatus::Active.as_str(),
            FargateProfileStatus::Deleting.as_str(),
        ])
        .target(&[])
        .wait_for_state()
        .await
        .map(|_| ())
}

pub async fn wait_nodegroup_created(
    client: &AwsClient,
    cluster_name: &str,
    nodegroup_name: &str,
) -> Result<Nodegroup> {
    let eks = &client.eks;
    let id = format!("{cluster_name}:{nodegroup_name}");
    let nodegroup = client
        .state_change(|| status_nodegroup(eks, cluster_name, nodegroup_name), NODEGROUP_TIMEOUT)
        .pending(&[NodegroupStatus::Creating.as_str()])
        .target(&[NodegroupStatus::Active.as_str(), NodegroupStatus::CreateFailed.as_str()])
        .wait_for_state()
        .await?
        .ok_or_else(|| missing("EKS Node Group", &id))?;

    if nodegroup.status() == Some(&NodegroupStatus::CreateFailed) {
        let issues = nodegroup
            .health()
            .map(|h| {
                h.issues()
                    .iter()
                    .map(|i| {
                        format!(
                            "{}: {}",
                            i.code().map(|c| c.as_str()).unwrap_or("Unknown"),
                            i.message().unwrap_or_default()
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        let status = NodegroupStatus::CreateFailed.as_str();
        return Err(issues_error("EKS Node Group", &id, status, issues));
    }
    Ok(nodegroup)
}

pub async fn wait_nodegroup_deleted(
    client: &AwsClient,
    cluster_name: &str,
    nodegroup_name: &str,
) -> Result<()> {
    let eks = &client.eks;
    client
        .state_change(|| status_nodegroup(eks, cluster_name, nodegroup_name), NODEGROUP_TIMEOUT)
        .pending(&[
            NodegroupStatus::Active.as_str(),
            NodegroupStatus::Creating.as_str(),
            NodegroupStatus::Deleting.as_str(),
        ])
        .target(&[])
        .wait_for_state()
        .await
        .map(|_| ())
}

pub async fn wait_nodegroup_update_successful(
    client: &AwsClient,
    cluster_name: &str,
    nodegroup_name: &str,
    id: &str,
) -> Result<Update> {
    let eks = &client.eks;
    let update = client
        .state_change(
            || status_nodegroup_update(eks, cluster_name, nodegroup_name, id),
            NODEGROUP_TIMEOUT,
        )
        .pending(&[UpdateStatus::InProgress.as_str()])
        .target(&[
            UpdateStatus::Successful.as_str(),
            UpdateStatus::Failed.as_str(),
            UpdateStatus::Cancelled.as_str(),
        ])
        .wait_for_state()
        .await?
        .ok_or_else(|| missing("EKS Node Group update", id))?;
    update_outcome(update)
}

pub async fn wait_oidc_identity_provider_config_created(
    client: &AwsClient,
    cluster_name: &str,
    config_name: &str,
) -> Result<OidcIdentityProviderConfig> {
    let eks = &client.eks;
    client
        .state_change(
            || status_oidc_identity_provider_config(eks, cluster_name, config_name),
            OIDC_CONFIG_TIMEOUT,
        )
        .pending(&[ConfigStatus::Creating.as_str()])
        .target(&[ConfigStatus::Active.as_str()])
        .wait_for_state()
        .await?
        .ok_or_else(|| {
            missing(
                "EKS Identity Provider Config",
                &format!("{cluster_name}:{config_name}"),
            )
        })
}

pub async fn wait_oidc_identity_provider_config_deleted(
    client: &AwsClient,
    cluster_name: &str,
    config_name: &str,
) -> Result<()> {
    let eks = &client.eks;
    client
        .state_change(
            || status_oidc_identity_provider_config(eks, cluster_name, config_name),
            OIDC_CONFIG_TIMEOUT,
        )
        .pending(&[ConfigStatus::Active.as_str(), ConfigStatus::Deleting.as_str()])
        .target(&[])
        .wait_for_state()
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_eks::types::{ErrorCode, ErrorDetail};

    #[test]
    fn test_successful_update() {
        let update = Update::builder().id("u-1").status(UpdateStatus::Successful).build();
        assert_eq!(update_outcome(update).unwrap().id(), Some("u-1"));
    }

    #[test]
    fn test_failed_update_carries_errors() {
        let update = Update::builder()
            .id("u-2")
            .status(UpdateStatus::Failed)
            .errors(
                ErrorDetail::builder()
                    .error_code(ErrorCode::SubnetNotFound)
                    .error_message("subnet-123 does not exist")
                    .build(),
            )
            .build();
        let message = update_outcome(update).unwrap_err().to_string();
        assert!(message.contains("u-2"));
        assert!(message.contains("Failed"));
        assert!(message.contains("SubnetNotFound: subnet-123 does not exist"));
    }

    #[test]
    fn test_cancelled_update() {
        let update = Update::builder().id("u-3").status(UpdateStatus::Cancelled).build();
        assert!(update_outcome(update).is_err());
    }
}
