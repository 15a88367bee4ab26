//! MSK refresh functions for the state poller

use super::finder::{find_cluster_by_arn, find_cluster_operation_by_arn, find_configuration_by_arn};
use aws_sdk_kafka::Client;
use aws_sdk_kafka::operation::describe_configuration::DescribeConfigurationOutput;
use aws_sdk_kafka::types::{ClusterInfo, ClusterOperationInfo};
use cloudrig_core::{Refreshed, Result};

pub async fn status_cluster_state(client: &Client, arn: &str) -> Result<Refreshed<ClusterInfo>> {
    Ok(find_cluster_by_arn(client, arn).await?.map(|cluster| {
        let state = cluster.state().map(|s| s.as_str().to_string()).unwrap_or_default();
        (cluster, state)
    }))
}

pub async fn status_cluster_operation_state(
    client: &Client,
    arn: &str,
) -> Result<Refreshed<ClusterOperationInfo>> {
    Ok(find_cluster_operation_by_arn(client, arn).await?.map(|operation| {
        let state = operation.operation_state().unwrap_or_default().to_string();
        (operation, state)
    }))
}

pub async fn status_configuration_state(
    client: &Client,
    arn: &str,
) -> Result<Refreshed<DescribeConfigurationOutput>> {
    Ok(find_configuration_by_arn(client, arn).await?.map(|configuration| {
        let state = configuration.state().map(|s| s.as_str().to_string()).unwrap_or_default();
        (configuration, state)
    }))
}
