#![allow(dead_code)]

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use cloudrig_aws::AwsClient;
use cloudrig_config::ProviderConfig;
use cloudrig_core::acctest::acc_enabled;
use std::collections::BTreeMap;

pub const ACCOUNT_ID: &str = "123456789012";

const SERVICES: &[&str] = &[
    "directconnect",
    "ec2",
    "ecs",
    "eks",
    "glue",
    "kafka",
    "pinpoint",
    "resourcegroups",
    "servicequotas",
    "sts",
];

/// A client for the real AWS account, or `None` when acceptance tests are
/// disabled.
pub async fn client() -> Option<AwsClient> {
    if !acc_enabled() {
        return None;
    }
    let mut config = ProviderConfig::default();
    config.apply_env_overrides();
    if config.region.is_none() {
        config.region = Some("us-west-2".to_string());
    }
    Some(AwsClient::new(&config).await.expect("AWS credentials"))
}

/// A client sending every service call to `uri`.
pub fn mock_client(uri: &str) -> AwsClient {
    let endpoints: BTreeMap<String, String> = SERVICES
        .iter()
        .map(|s| (s.to_string(), uri.to_string()))
        .collect();
    let config = ProviderConfig {
        region: Some("us-west-2".to_string()),
        endpoints,
        poll_interval: Some(0),
        ..Default::default()
    };

    let sdk = SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-west-2"))
        .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
            "AKIDEXAMPLE",
            "secret",
            None,
            None,
            "test",
        )))
        .retry_config(RetryConfig::disabled())
        .build();

    AwsClient::from_sdk_config(&sdk, &config, ACCOUNT_ID)
}

/// Environment variable required by a test, or `None` with a note on stderr.
pub fn env_or_skip(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => {
            eprintln!("skipping test: environment variable {key} must be set");
            None
        }
    }
}
