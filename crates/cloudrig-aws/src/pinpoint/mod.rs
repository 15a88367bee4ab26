//! Pinpoint
//!
//! Pinpoint wraps tags in a `TagsModel` on both read and write.

use crate::awserr::{build_error, sdk_error};
use async_trait::async_trait;
use aws_sdk_pinpoint::types::TagsModel;
use cloudrig_core::{KeyValueTags, Result, TagService};
use std::collections::HashMap;

pub struct PinpointTags {
    client: aws_sdk_pinpoint::Client,
}

impl PinpointTags {
    pub fn new(client: aws_sdk_pinpoint::Client) -> Self {
        Self { client }
    }
}

/// Pinpoint tag model for the given set.
pub fn tags_model(tags: &KeyValueTags) -> Result<TagsModel> {
    TagsModel::builder()
        .set_tags(Some(tags.map().into_iter().collect::<HashMap<_, _>>()))
        .build()
        .map_err(build_error)
}

#[async_trait]
impl TagService for PinpointTags {
    async fn list_tags(&self, identifier: &str) -> Result<KeyValueTags> {
        let output = self
            .client
            .list_tags_for_resource()
            .resource_arn(identifier)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(output
            .tags_model()
            .map(|m| KeyValueTags::from(m.tags().clone()))
            .unwrap_or_default())
    }

    async fn tag_resource(&self, identifier: &str, tags: &KeyValueTags) -> Result<()> {
        self.client
            .tag_resource()
            .resource_arn(identifier)
            .tags_model(tags_model(tags)?)
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
