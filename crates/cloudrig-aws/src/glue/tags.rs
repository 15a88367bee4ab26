//! Glue resource tags

use crate::awserr::sdk_error;
use async_trait::async_trait;
use cloudrig_core::{KeyValueTags, Result, TagService};
use std::collections::HashMap;

pub struct GlueTags {
    client: aws_sdk_glue::Client,
}

impl GlueTags {
    pub fn new(client: aws_sdk_glue::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TagService for GlueTags {
    async fn list_tags(&self, identifier: &str) -> Result<KeyValueTags> {
        let output = self
            .client
            .get_tags()
            .resource_arn(identifier)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output.tags().cloned().map(KeyValueTags::from).unwrap_or_default())
    }

    async fn tag_resource(&self, identifier: &str, tags: &KeyValueTags) -> Result<()> {
        self.client
            .tag_resource()
            .resource_arn(identifier)
            .set_tags_to_add(Some(tags.map().into_iter().collect::<HashMap<_, _>>()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn untag_resource(&self, identifier: &str, keys: &[String]) -> Result<()> {
        self.client
            .untag_resource()
            .resource_arn(identifier)
            .set_tags_to_remove(Some(keys.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
