//! In-memory stand-ins for vendor services, for unit tests.

use crate::error::{CloudError, Result};
use crate::provider::{ResourceConfig, ResourceModule};
use crate::state::ResourceState;
use crate::tags::{KeyValueTags, TagService};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// A resource module backed by a map instead of an API.
pub struct MemoryModule {
    resource_type: String,
    force_new: Vec<&'static str>,
    next_id: AtomicU64,
    objects: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryModule {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            force_new: Vec::new(),
            next_id: AtomicU64::new(1),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn force_new(mut self, attributes: &[&'static str]) -> Self {
        self.force_new = attributes.to_vec();
        self
    }

    /// Simulate out-of-band deletion.
    pub fn remove(&self, id: &str) {
        self.objects.lock().unwrap().remove(id);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn state(&self, id: &str, attributes: &serde_json::Value) -> ResourceState {
        ResourceState::new(id, &self.resource_type)
            .with_attributes(attributes.clone())
            .with_attribute("id", serde_json::json!(id))
    }
}

#[async_trait]
impl ResourceModule for MemoryModule {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn force_new_attributes(&self) -> &[&str] {
        &self.force_new
    }

    async fn create(&self, config: &ResourceConfig) -> Result<ResourceState> {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-{n}", config.name);
        self.objects
            .lock()
            .unwrap()
            .insert(id.clone(), config.config.clone());
        Ok(self.state(&id, &config.config))
    }

    async fn read(&self, id: &str) -> Result<Option<ResourceState>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(id).map(|attrs| self.state(id, attrs)))
    }

    async fn update(
        &self,
        prior: &ResourceState,
        config: &ResourceConfig,
    ) -> Result<ResourceState> {
        let mut objects = self.objects.lock().unwrap();
        let slot = objects
            .get_mut(&prior.id)
            .ok_or_else(|| CloudError::ResourceNotFound(prior.id.clone()))?;
        *slot = config.config.clone();
        Ok(self.state(&prior.id, &config.config))
    }

    async fn delete(&self, state: &ResourceState) -> Result<()> {
        self.objects.lock().unwrap().remove(&state.id);
        Ok(())
    }
}

/// Calls recorded by [`MemoryTagService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagCall {
    Tag(String, BTreeMap<String, String>),
    Untag(String, Vec<String>),
}

/// A tagging API backed by a map.
#[derive(Default)]
pub struct MemoryTagService {
    tags: Mutex<HashMap<String, BTreeMap<String, String>>>,
    calls: Mutex<Vec<TagCall>>,
}

impl MemoryTagService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, identifier: &str, tags: &[(&str, &str)]) {
        self.tags.lock().unwrap().insert(
            identifier.to_string(),
            tags.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    pub fn calls(&self) -> Vec<TagCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn current(&self, identifier: &str) -> BTreeMap<String, String> {
        self.tags
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TagService for MemoryTagService {
    async fn list_tags(&self, identifier: &str) -> Result<KeyValueTags> {
        Ok(KeyValueTags::from(self.current(identifier)))
    }

    async fn tag_resource(&self, identifier: &str, tags: &KeyValueTags) -> Result<()> {
        let map = tags.map();
        self.calls
            .lock()
            .unwrap()
            .push(TagCall::Tag(identifier.to_string(), map.clone()));
        self.tags
            .lock()
            .unwrap()
            .entry(identifier.to_string())
            .or_default()
            .extend(map);
        Ok(())
    }

    async fn untag_resource(&self, identifier: &str, keys: &[String]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(TagCall::Untag(identifier.to_string(), keys.to_vec()));
        if let Some(current) = self.tags.lock().unwrap().get_mut(identifier) {
            for key in keys {
                current.remove(key);
            }
        }
        Ok(())
    }
}
