//! Resource Groups
//!
//! Only tagging is managed here; the group resource itself lives elsewhere.

use crate::awserr::sdk_error;
use async_trait::async_trait;
use cloudrig_core::{KeyValueTags, Result, TagService};
use std::collections::HashMap;

/// Resource Groups tags, addressed by group ARN.
pub struct ResourceGroupsTags {
    client: aws_sdk_resourcegroups::Client,
}

impl ResourceGroupsTags {
    pub fn new(client: aws_sdk_resourcegroups::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TagService for ResourceGroupsTags {
    async fn list_tags(&self, identifier: &str) -> Result<KeyValueTags> {
        let output = self
            .client
            .get_tags()
            .arn(identifier)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output.tags().cloned().map(KeyValueTags::from).unwrap_or_default())
    }

    async fn tag_resource(&self, identifier: &str, tags: &KeyValueTags) -> Result<()> {
        self.client
            .tag()
            .arn(identifier)
            .set_tags(Some(tags.map().into_iter().collect::<HashMap<_, _>>()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn untag_resource(&self, identifier: &str, keys: &[String]) -> Result<()> {
        self.client
            .untag()
            .arn(identifier)
            .set_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }
}
