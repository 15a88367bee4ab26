mod common;

use cloudrig_aws::arn::check_resource_attr_regional_arn;
use cloudrig_aws::registry;
use cloudrig_core::{DataSource, ProjectState};
use cloudrig_core::acctest::{Check, check, check_resource_attr};
use serde_json::{Value, json};

const DATA_SOURCE: &str = "data.aws_servicequotas_service_quota.test";

/// Read the data source and record it under [`DATA_SOURCE`].
async fn read(client: &cloudrig_aws::AwsClient, config: Value) -> ProjectState {
    let source = registry(client)
        .data_source("aws_servicequotas_service_quota")
        .unwrap();
    let mut state = ProjectState::new();
    state.set_resource(DATA_SOURCE.to_string(), source.read(&config).await.unwrap());
    state
}

fn vpc_checks(client: &cloudrig_aws::AwsClient) -> Vec<Check> {
    vec![
        check_resource_attr(DATA_SOURCE, "adjustable", "true"),
        check_resource_attr_regional_arn(
            client,
            DATA_SOURCE,
            "arn",
            "servicequotas",
            "vpc/L-F678F1CE",
        ),
        check_resource_attr(DATA_SOURCE, "default_value", "5"),
        check_resource_attr(DATA_SOURCE, "global_quota", "false"),
        check_resource_attr(DATA_SOURCE, "quota_code", "L-F678F1CE"),
        check_resource_attr(DATA_SOURCE, "quota_name", "VPCs per Region"),
        check_resource_attr(DATA_SOURCE, "service_code", "vpc"),
        check_resource_attr(
            DATA_SOURCE,
            "service_name",
            "Amazon Virtual Private Cloud (Amazon VPC)",
        ),
    ]
}

#[tokio::test]
async fn test_acc_servicequotas_service_quota_by_code() {
    let Some(client) = common::client().await else { return };
    let state = read(&client, json!({"service_code": "vpc", "quota_code": "L-F678F1CE"})).await;
    check::run_all(&vpc_checks(&client), &state).await.unwrap();
}

#[tokio::test]
async fn test_acc_servicequotas_service_quota_by_name() {
    let Some(client) = common::client().await else { return };
    let config = json!({"service_code": "vpc", "quota_name": "VPCs per Region"});
    let state = read(&client, config).await;
    check::run_all(&vpc_checks(&client), &state).await.unwrap();
}

#[tokio::test]
async fn test_acc_servicequotas_service_quota_unknown_name() {
    let Some(client) = common::client().await else { return };
    let source = registry(&client)
        .data_source("aws_servicequotas_service_quota")
        .unwrap();
    let err = source
        .read(&json!({"service_code": "vpc", "quota_name": "tf-acc-test-no-such-quota"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("tf-acc-test-no-such-quota"));
}
