//! Provider and resource-module traits

use crate::action::{ApplyResult, Plan};
use crate::error::{CloudError, Result};
use crate::state::{ProjectState, ResourceState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Cloud provider abstraction trait
///
/// A provider owns a registry of resource modules and drives them from a
/// declared [`ResourceSet`].
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "aws")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Get the recorded state of all resources, refreshed against the API
    async fn get_state(&self) -> Result<ProjectState>;

    /// Calculate the diff between desired and current state
    async fn plan(&self, desired: &ResourceSet) -> Result<Plan>;

    /// Apply the planned actions
    async fn apply(&self, plan: &Plan, desired: &ResourceSet) -> Result<ApplyResult>;

    /// Destroy a specific resource by its `type.name` key
    async fn destroy(&self, key: &str) -> Result<()>;

    /// Destroy all resources recorded in state
    async fn destroy_all(&self) -> Result<ApplyResult>;
}

/// Maps one cloud-managed entity type onto create/read/update/delete calls.
#[async_trait]
pub trait ResourceModule: Send + Sync {
    /// Resource type name, e.g. `aws_glue_workflow`
    fn resource_type(&self) -> &str;

    /// Attributes whose change forces the resource to be replaced
    fn force_new_attributes(&self) -> &[&str] {
        &[]
    }

    /// Attributes that are write-only and not returned by `read`.
    /// Import verification skips them.
    fn write_only_attributes(&self) -> &[&str] {
        &[]
    }

    /// Create the resource and return its state
    async fn create(&self, config: &ResourceConfig) -> Result<ResourceState>;

    /// Read the live resource; `None` when it no longer exists
    async fn read(&self, id: &str) -> Result<Option<ResourceState>>;

    /// Re-read a recorded resource. Modules whose API omits attributes the
    /// configuration set carry them over from `prior`.
    async fn refresh(&self, prior: &ResourceState) -> Result<Option<ResourceState>> {
        self.read(&prior.id).await
    }

    /// Update the resource in place
    async fn update(
        &self,
        prior: &ResourceState,
        config: &ResourceConfig,
    ) -> Result<ResourceState>;

    /// Delete the resource. A resource that is already gone is not an error.
    async fn delete(&self, state: &ResourceState) -> Result<()>;

    /// Import an existing resource by its identifier
    async fn import(&self, id: &str) -> Result<ResourceState> {
        self.read(id)
            .await?
            .ok_or_else(|| CloudError::ResourceNotFound(format!("{} ({id})", self.resource_type())))
    }
}

/// Read-only lookup of vendor data.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name, e.g. `aws_servicequotas_service_quota`
    fn data_type(&self) -> &str;

    /// Read the data described by `config`
    async fn read(&self, config: &serde_json::Value) -> Result<ResourceState>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// Set of resources to be managed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSet {
    /// Resources indexed by `type.name`
    pub resources: BTreeMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceConfig) {
        self.resources.insert(resource.key(), resource);
    }

    pub fn with(mut self, resource: ResourceConfig) -> Self {
        self.add(resource);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ResourceConfig> {
        self.resources.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// A resource manifest document: `resources: [{type, name, config}]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl From<Manifest> for ResourceSet {
    fn from(manifest: Manifest) -> Self {
        let mut set = ResourceSet::new();
        for resource in manifest.resources {
            set.add(resource);
        }
        set
    }
}

/// Configuration for a cloud resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type (e.g., "aws_glue_workflow")
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Local name distinguishing resources of the same type
    pub name: String,

    /// Resource-specific configuration
    #[serde(default = "empty_object")]
    pub config: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            config,
        }
    }

    /// Get the full resource key (type.name)
    pub fn key(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    /// Get a configuration value as a specific type
    pub fn get_config<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a required string attribute
    pub fn require_str(&self, key: &str) -> Result<String> {
        self.get_config::<String>(key)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CloudError::InvalidConfig(format!(
                    "{}: attribute \"{key}\" is required",
                    self.key()
                ))
            })
    }

    /// Deserialize the whole configuration into a typed model
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| CloudError::InvalidConfig(format!("{}: {e}", self.key())))
    }
}

/// Resource-type -> module lookup
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, Arc<dyn ResourceModule>>,
    data_sources: HashMap<String, Arc<dyn DataSource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Arc<dyn ResourceModule>) {
        self.resources
            .insert(module.resource_type().to_string(), module);
    }

    pub fn register_data_source(&mut self, source: Arc<dyn DataSource>) {
        self.data_sources
            .insert(source.data_type().to_string(), source);
    }

    pub fn get(&self, resource_type: &str) -> Result<Arc<dyn ResourceModule>> {
        self.resources
            .get(resource_type)
            .cloned()
            .ok_or_else(|| CloudError::UnsupportedResource(resource_type.to_string()))
    }

    pub fn data_source(&self, data_type: &str) -> Result<Arc<dyn DataSource>> {
        self.data_sources
            .get(data_type)
            .cloned()
            .ok_or_else(|| CloudError::UnsupportedResource(data_type.to_string()))
    }

    /// Registered resource types, sorted
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: std::time::Duration,

    /// Maximum delay between retries
    pub max_delay: std::time::Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: std::time::Duration::from_secs(1),
            max_delay: std::time::Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the given retry (1-based)
    pub fn delay_for(&self, retry: u32) -> std::time::Duration {
        let factor = self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        let delay = self.initial_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_manifest_into_resource_set() {
        let manifest: Manifest = serde_json::from_value(json!({
            "resources": [
                {"type": "aws_glue_workflow", "name": "test", "config": {"name": "wf"}},
                {"type": "aws_glue_connection", "name": "test"}
            ]
        }))
        .unwrap();

        let set = ResourceSet::from(manifest);
        assert_eq!(set.len(), 2);
        let wf = set.get("aws_glue_workflow.test").unwrap();
        assert_eq!(wf.get_config::<String>("name").as_deref(), Some("wf"));
        assert!(set.get("aws_glue_connection.test").unwrap().config.is_object());
    }

    #[test]
    fn test_require_str() {
        let config = ResourceConfig::new("aws_glue_workflow", "test", json!({"name": ""}));
        let err = config.require_str("name").unwrap_err();
        assert!(err.to_string().contains("\"name\" is required"));
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        };
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(4));
        assert_eq!(config.delay_for(4), Duration::from_secs(5));
    }
}
