//! MSK waiters

use super::status::{
    status_cluster_operation_state, status_cluster_state, status_configuration_state,
};
use crate::conns::AwsClient;
use aws_sdk_kafka::types::{ClusterInfo, ClusterOperationInfo, ClusterState, ConfigurationState};
use cloudrig_core::{CloudError, Result};
use std::time::Duration;

pub const CLUSTER_CREATE_TIMEOUT: Duration = Duration::from_secs(120 * 60);
pub const CLUSTER_DELETE_TIMEOUT: Duration = Duration::from_secs(120 * 60);
pub const CLUSTER_OPERATION_TIMEOUT: Duration = Duration::from_secs(120 * 60);
pub const CONFIGURATION_DELETED_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const OPERATION_STATE_PENDING: &str = "PENDING";
pub const OPERATION_STATE_UPDATE_IN_PROGRESS: &str = "UPDATE_IN_PROGRESS";
pub const OPERATION_STATE_UPDATE_COMPLETE: &str = "UPDATE_COMPLETE";
pub const OPERATION_STATE_UPDATE_FAILED: &str = "UPDATE_FAILED";

/// A failed cluster becomes an error carrying its state info.
pub fn cluster_outcome(cluster: ClusterInfo) -> Result<ClusterInfo> {
    if cluster.state() != Some(&ClusterState::Failed) {
        return Ok(cluster);
    }
    let info = cluster.state_info();
    Err(CloudError::Api {
        code: info.and_then(|i| i.code()).map(str::to_string),
        message: format!(
            "MSK Cluster ({}) failed: {}",
            cluster.cluster_arn().unwrap_or_default(),
            info.and_then(|i| i.message()).unwrap_or_default()
        ),
    })
}

/// A failed operation becomes an error carrying its error info.
pub fn operation_outcome(operation: ClusterOperationInfo) -> Result<ClusterOperationInfo> {
    if operation.operation_state() != Some(OPERATION_STATE_UPDATE_FAILED) {
        return Ok(operation);
    }
    let info = operation.error_info();
    Err(CloudError::Api {
        code: info.and_then(|i| i.error_code()).map(str::to_string),
        message: format!(
            "MSK Cluster operation ({}) failed: {}",
            operation.cluster_operation_arn().unwrap_or_default(),
            info.and_then(|i| i.error_string()).unwrap_or_default()
        ),
    })
}

pub async fn wait_cluster_created(client: &AwsClient, arn: &str) -> Result<ClusterInfo> {
    let kafka = &client.kafka;
    let cluster = client
        .state_change(|| status_cluster_state(kafka, arn), CLUSTER_CREATE_TIMEOUT)
        .pending(&[ClusterState::Creating.as_str()])
        .target(&[ClusterState::Active.as_str(), ClusterState::Failed.as_str()])
        .wait_for_state()
        .await?
        .ok_or_else(|| CloudError::ResourceNotFound(format!("MSK Cluster ({arn})")))?;
    cluster_outcome(cluster)
}

pub async fn wait_cluster_deleted(client: &AwsClient, arn: &str) -> Result<()> {
    let kafka = &client.kafka;
    client
        .state_change(|| status_cluster_state(kafka, arn), CLUSTER_DELETE_TIMEOUT)
        .pending(&[ClusterState::Deleting.as_str()])
        .target(&[])
        .wait_for_state()
        .await
        .map(|_| ())
}

pub async fn wait_cluster_operation_completed(
    client: &AwsClient,
    arn: &str,
) -> Result<ClusterOperationInfo> {
    let kafka = &client.kafka;
    let operation = client
        .state_change(|| status_cluster_operation_state(kafka, arn), CLUSTER_OPERATION_TIMEOUT)
        .pending(&[OPERATION_STATE_PENDING, OPERATION_STATE_UPDATE_IN_PROGRESS])
        .target(&[OPERATION_STATE_UPDATE_COMPLETE, OPERATION_STATE_UPDATE_FAILED])
        .wait_for_state()
        .await?
        .ok_or_else(|| CloudError::ResourceNotFound(format!("MSK Cluster operation ({arn})")))?;
    operation_outcome(operation)
}

pub async fn wait_configuration_deleted(client: &AwsClient, arn: &str) -> Result<()> {
    let kafka = &client.kafka;
    client
        .state_change(|| status_configuration_state(kafka, arn), CONFIGURATION_DELETED_TIMEOUT)
        .pending(&[ConfigurationState::Deleting.as_str()])
        .target(&[])
        .wait_for_state()
        .await
        .map(|_| ())
}
