//! ECS resource tags

use crate::awserr::sdk_error;
use async_trait::async_trait;
use aws_sdk_ecs::types::Tag;
use cloudrig_core::{KeyValueTags, Result, TagService};

pub struct EcsTags {
    client: aws_sdk_ecs::Client,
}

impl EcsTags {
    pub fn new(client: aws_sdk_ecs::Client) -> Self {
        Self { client }
    }
}

/// ECS tags for the given set.
pub fn tags(tags: &KeyValueTags) -> Vec<Tag> {
    tags.iter()
        .map(|(k, v)| Tag::builder().key(k).value(v).build())
        .collect()
}

/// A tag set from ECS tags.
pub fn key_value_tags(tags: &[Tag]) -> KeyValueTags {
    tags.iter()
        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
        .collect()
}

#[async_trait]
impl TagService for EcsTags {
    async fn list_tags(&self, identifier: &str) -> Result<KeyValueTags> {
        let output = self
            .client
            .list_tags_for_resource()
            .resource_arn(identifier)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(key_value_tags(output.tags()))
    }

    async fn tag_resource(&self, identifier: &str, tags: &KeyValueTags) -> Result<()> {
        self.client
            .tag_resource()
            .resource_arn(identifier)
            .set_tags(Some(self::tags(tags)))
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
        let set = KeyValueTags::from([("Name", "web"), ("env", "test")]);
        let ecs = tags(&set);
        assert_eq!(ecs.len(), 2);
        assert_eq!(ecs[0].key(), Some("Name"));
        assert_eq!(key_value_tags(&ecs), set);
    }
}
