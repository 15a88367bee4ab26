//! Shared AWS connection state
//!
//! One [`AwsClient`] is built per provider run and cloned into every
//! resource module. It carries a client per service, the resolved region,
//! partition and account, and the provider-wide tag and polling settings.

use crate::arn::{Arn, partition_for_region};
use crate::awserr::sdk_error;
use crate::error::{AwsError, Result};
use aws_config::retry::RetryConfig as SdkRetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use cloudrig_config::ProviderConfig;
use cloudrig_core::{IgnoreConfig, KeyValueTags, RetryConfig, StateChangeConf, TagPolicy};
use std::time::Duration;

macro_rules! service_client {
    ($krate:ident, $sdk:expr, $config:expr, $service:literal) => {{
        let mut builder = $krate::config::Builder::from($sdk);
        if let Some(url) = $config.endpoint($service) {
            tracing::debug!("Using endpoint override for {}: {url}", $service);
            builder = builder.endpoint_url(url);
        }
        $krate::Client::from_conf(builder.build())
    }};
}

#[derive(Clone)]
pub struct AwsClient {
    pub region: String,
    pub partition: String,
    pub account_id: String,

    pub tag_policy: TagPolicy,
    pub retry: RetryConfig,
    timeout: Option<Duration>,
    poll_interval: Option<Duration>,

    pub directconnect: aws_sdk_directconnect::Client,
    pub ec2: aws_sdk_ec2::Client,
    pub ecs: aws_sdk_ecs::Client,
    pub eks: aws_sdk_eks::Client,
    pub glue: aws_sdk_glue::Client,
    pub kafka: aws_sdk_kafka::Client,
    pub pinpoint: aws_sdk_pinpoint::Client,
    pub resourcegroups: aws_sdk_resourcegroups::Client,
    pub servicequotas: aws_sdk_servicequotas::Client,
    pub sts: aws_sdk_sts::Client,
}

impl AwsClient {
    /// Load credentials through the default provider chain and resolve the
    /// caller's account.
    pub async fn new(config: &ProviderConfig) -> Result<Self> {
        let region = config.region()?.to_string();

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(max_retries) = config.max_retries {
            let retry = SdkRetryConfig::standard().with_max_attempts(max_retries.max(1));
            loader = loader.retry_config(retry);
        }
        let sdk = loader.load().await;

        let mut client = Self::from_sdk_config(&sdk, config, "");
        client.account_id = client.caller_identity().await?.0;
        tracing::info!(
            "Configured AWS client for account {} in {} ({})",
            client.account_id,
            client.region,
            client.partition
        );
        Ok(client)
    }

    /// Build the service clients from an already loaded SDK configuration.
    pub fn from_sdk_config(
        sdk: &SdkConfig,
        config: &ProviderConfig,
        account_id: impl Into<String>,
    ) -> Self {
        let region = sdk
            .region()
            .map(|r| r.to_string())
            .or_else(|| config.region.clone())
            .unwrap_or_default();
        let partition = partition_for_region(&region).to_string();

        let tag_policy = TagPolicy {
            default_tags: KeyValueTags::from(config.default_tags.clone()),
            ignore: IgnoreConfig {
                keys: config.ignore_tags.keys.clone(),
                key_prefixes: config.ignore_tags.key_prefixes.clone(),
            },
        };

        let mut retry = RetryConfig::default();
        if let Some(max_retries) = config.max_retries {
            retry.max_attempts = max_retries.max(1);
        }

        Self {
            region,
            partition,
            account_id: account_id.into(),
            tag_policy,
            retry,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            directconnect: service_client!(aws_sdk_directconnect, sdk, config, "directconnect"),
            ec2: service_client!(aws_sdk_ec2, sdk, config, "ec2"),
            ecs: service_client!(aws_sdk_ecs, sdk, config, "ecs"),
            eks: service_client!(aws_sdk_eks, sdk, config, "eks"),
            glue: service_client!(aws_sdk_glue, sdk, config, "glue"),
            kafka: service_client!(aws_sdk_kafka, sdk, config, "kafka"),
            pinpoint: service_client!(aws_sdk_pinpoint, sdk, config, "pinpoint"),
            resourcegroups: service_client!(aws_sdk_resourcegroups, sdk, config, "resourcegroups"),
            servicequotas: service_client!(aws_sdk_servicequotas, sdk, config, "servicequotas"),
            sts: service_client!(aws_sdk_sts, sdk, config, "sts"),
        }
    }

    /// Account id and caller ARN of the configured credentials.
    pub async fn caller_identity(&self) -> Result<(String, String)> {
        let output = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(sdk_error)?;

        let account = output
            .account()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                AwsError::AccountId("GetCallerIdentity returned no account".to_string())
            })?;
        Ok((account.to_string(), output.arn().unwrap_or_default().to_string()))
    }

    /// ARN of a resource in this client's partition, region and account.
    pub fn regional_arn(&self, service: &str, resource: &str) -> String {
        Arn::new(
            self.partition.clone(),
            service,
            self.region.clone(),
            self.account_id.clone(),
            resource,
        )
        .to_string()
    }

    /// A state poller for one waiter. `default_timeout` is the waiter's own
    /// budget; a `default_timeout` set in the provider config replaces it.
    pub fn state_change<F>(&self, refresh: F, default_timeout: Duration) -> StateChangeConf<F> {
        let timeout = match self.timeout {
            Some(configured) => configured,
            None => default_timeout,
        };
        let conf = StateChangeConf::new(refresh).timeout(timeout);
        match self.poll_interval {
            Some(interval) => conf.poll_interval(interval),
            None => conf,
        }
    }
}
