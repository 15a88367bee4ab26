//! Direct Connect resource tags

use crate::awserr::{build_error, sdk_error};
use async_trait::async_trait;
use aws_sdk_directconnect::types::Tag;
use cloudrig_core::{KeyValueTags, Result, TagService};

pub struct DirectConnectTags {
    client: aws_sdk_directconnect::Client,
}

impl DirectConnectTags {
    pub fn new(client: aws_sdk_directconnect::Client) -> Self {
        Self { client }
    }
}

/// Direct Connect tags for the given set.
pub fn tags(tags: &KeyValueTags) -> Result<Vec<Tag>> {
    tags.iter()
        .map(|(k, v)| Tag::builder().key(k).value(v).build().map_err(build_error))
        .collect()
}

pub fn key_value_tags(tags: &[Tag]) -> KeyValueTags {
    tags.iter()
        .map(|t| (t.key().to_string(), t.value().unwrap_or_default().to_string()))
        .collect()
}

#[async_trait]
impl TagService for DirectConnectTags {
    async fn list_tags(&self, identifier: &str) -> Result<KeyValueTags> {
        let output = self
            .client
            .describe_tags()
            .resource_arns(identifier)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output
            .resource_tags()
            .first()
            .map(|r| key_value_tags(r.tags()))
            .unwrap_or_default())
    }

    async fn tag_resource(&self, identifier: &str, tags: &KeyValueTags) -> Result<()> {
        self.client
            .tag_resource()
            .resource_arn(identifier)
            .set_tags(Some(self::tags(tags)?))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn untag_resource(&self, identifier: &str, keys: &[String]) -> Result<()> {
        self.client
            .untag_resource()
            .resource_arn(identifier)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_conversion() {
        let set = KeyValueTags::from([("Name", "dx"), ("empty", "")]);
        let dx = tags(&set).unwrap();
        assert_eq!(dx.len(), 2);
        assert_eq!(key_value_tags(&dx), set);
    }
}
