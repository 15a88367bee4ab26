//! MSK lookups

use crate::awserr::{codes, not_found_as_none, sdk_error};
use aws_sdk_kafka::Client;
use aws_sdk_kafka::operation::describe_configuration::DescribeConfigurationOutput;
use aws_sdk_kafka::types::{ClusterInfo, ClusterOperationInfo};
use cloudrig_core::Result;

pub async fn find_cluster_by_arn(client: &Client, arn: &str) -> Result<Option<ClusterInfo>> {
    let output = client
        .describe_cluster()
        .cluster_arn(arn)
        .send()
        .await
        .map_err(sdk_error);
    let found = not_found_as_none(output, &[codes::KAFKA_NOT_FOUND])?;
    Ok(found.and_then(|o| o.cluster_info().cloned()))
}

pub async fn find_cluster_operation_by_arn(
    client: &Client,
    arn: &str,
) -> Result<Option<ClusterOperationInfo>> {
    let output = client
        .describe_cluster_operation()
        .cluster_operation_arn(arn)
        .send()
        .await
        .map_err(sdk_error);
    let found = not_found_as_none(output, &[codes::KAFKA_NOT_FOUND])?;
    Ok(found.and_then(|o| o.cluster_operation_info().cloned()))
}

pub async fn find_configuration_by_arn(
    client: &Client,
    arn: &str,
) -> Result<Option<DescribeConfigurationOutput>> {
    let output = client
        .describe_configuration()
        .arn(arn)
        .send()
        .await
        .map_err(sdk_error);
    not_found_as_none(output, &[codes::KAFKA_NOT_FOUND])
}
