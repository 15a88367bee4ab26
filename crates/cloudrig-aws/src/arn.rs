//! Amazon Resource Names

use crate::conns::AwsClient;
use crate::error::{AwsError, Result};
use cloudrig_core::acctest::Check;
use cloudrig_core::acctest::flatmap::flatten_state;
use cloudrig_core::CloudError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// `arn:partition:service:region:account-id:resource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    pub fn new(
        partition: impl Into<String>,
        service: impl Into<String>,
        region: impl Into<String>,
        account_id: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            service: service.into(),
            region: region.into(),
            account_id: account_id.into(),
            resource: resource.into(),
        }
    }
}

impl FromStr for Arn {
    type Err = AwsError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| AwsError::InvalidArn {
            arn: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.splitn(6, ':').collect();
        if parts.len() != 6 {
            return Err(invalid("expected 6 colon-separated sections"));
        }
        if parts[0] != "arn" {
            return Err(invalid("must start with \"arn:\""));
        }
        if parts[1].is_empty() {
            return Err(invalid("partition is empty"));
        }
        if parts[2].is_empty() {
            return Err(invalid("service is empty"));
        }
        if parts[5].is_empty() {
            return Err(invalid("resource is empty"));
        }

        Ok(Self::new(parts[1], parts[2], parts[3], parts[4], parts[5]))
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// Whether `s` parses as an ARN.
pub fn is_arn(s: &str) -> bool {
    s.parse::<Arn>().is_ok()
}

/// AWS partition a region belongs to.
pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else if region.starts_with("us-isob-") {
        "aws-iso-b"
    } else if region.starts_with("us-iso-") {
        "aws-iso"
    } else {
        "aws"
    }
}

/// Attribute `path` of `key` equals the regional ARN of `service`/`resource`
/// in the client's partition, region and account.
pub fn check_resource_attr_regional_arn(
    client: &AwsClient,
    key: &str,
    path: &str,
    service: &str,
    resource: &str,
) -> Check {
    let expected = client.regional_arn(service, resource);
    let (key, path) = (key.to_string(), path.to_string());
    Check::new(move |state| {
        let resource = state
            .get_resource(&key)
            .ok_or_else(|| CloudError::CheckFailed(format!("Not found: {key} in state")))?;
        match flatten_state(resource).remove(&path) {
            Some(actual) if actual == expected => Ok(()),
            actual => Err(CloudError::CheckFailed(format!(
                "{key}: Attribute '{path}' expected \"{expected}\", got {actual:?}"
            ))),
        }
    })
}

/// Attribute `path` of `key` is a regional ARN of `service` in the client's
/// partition, region and account, with a resource matching `resource`.
pub fn match_resource_attr_regional_arn(
    client: &AwsClient,
    key: &str,
    path: &str,
    service: &str,
    resource: Regex,
) -> Check {
    let expected = Arn::new(
        client.partition.clone(),
        service,
        client.region.clone(),
        client.account_id.clone(),
        "",
    );
    let (key, path) = (key.to_string(), path.to_string());
    Check::new(move |state| {
        let recorded = state
            .get_resource(&key)
            .ok_or_else(|| CloudError::CheckFailed(format!("Not found: {key} in state")))?;
        let actual = flatten_state(recorded)
            .remove(&path)
            .ok_or_else(|| {
                CloudError::CheckFailed(format!("{key}: Attribute '{path}' not found"))
            })?;
        let arn: Arn = actual
            .parse()
            .map_err(|e: AwsError| CloudError::CheckFailed(e.to_string()))?;

        let same_scope = arn.partition == expected.partition
            && arn.service == expected.service
            && arn.region == expected.region
            && arn.account_id == expected.account_id;
        if same_scope && resource.is_match(&arn.resource) {
            Ok(())
        } else {
            Err(CloudError::CheckFailed(format!(
                "{key}: Attribute '{path}' ({actual}) is not a {} ARN in {}/{} \
                 matching {resource:?}",
                expected.service, expected.region, expected.account_id
            )))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let arn: Arn = "arn:aws:glue:us-west-2:123456789012:workflow/my-wf"
            .parse()
            .unwrap();
        assert_eq!(arn.partition, "aws");
        assert_eq!(arn.service, "glue");
        assert_eq!(arn.region, "us-west-2");
        assert_eq!(arn.account_id, "123456789012");
        assert_eq!(arn.resource, "workflow/my-wf");
        assert_eq!(arn.to_string(), "arn:aws:glue:us-west-2:123456789012:workflow/my-wf");
    }

    #[test]
    fn test_resource_may_contain_colons() {
        let arn: Arn = "arn:aws:ecs:us-east-1:123456789012:task-definition/web:3"
            .parse()
            .unwrap();
        assert_eq!(arn.resource, "task-definition/web:3");
    }

    #[test]
    fn test_global_arn_has_empty_region() {
        let arn: Arn = "arn:aws:iam::123456789012:role/test".parse().unwrap();
        assert!(arn.region.is_empty());
    }

    #[test]
    fn test_invalid_arns() {
        assert!(!is_arn("my-family"));
        assert!(!is_arn("arn:aws:glue"));
        assert!(!is_arn("urn:aws:glue:us-west-2:123456789012:workflow/x"));
        assert!(!is_arn("arn:aws:glue:us-west-2:123456789012:"));
        assert!(matches!(
            "arn::glue:r:a:x".parse::<Arn>(),
            Err(AwsError::InvalidArn { .. })
        ));
    }

    #[test]
    fn test_partition_for_region() {
        assert_eq!(partition_for_region("us-west-2"), "aws");
        assert_eq!(partition_for_region("cn-north-1"), "aws-cn");
        assert_eq!(partition_for_region("us-gov-west-1"), "aws-us-gov");
        assert_eq!(partition_for_region("us-iso-east-1"), "aws-iso");
        assert_eq!(partition_for_region("us-isob-east-1"), "aws-iso-b");
    }
}
