//! Project state
//!
//! `.cloudrig/state.json` records, for every resource apply has touched,
//! the id AWS assigned, the attributes last read back and the config it was
//! applied with, keyed by `type.name`. Runs that write state hold
//! `.cloudrig/lock.json`, created with `O_EXCL` so only one can exist.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const FORMAT_VERSION: u32 = 1;
const STATE_DIR: &str = ".cloudrig";
const STATE_FILE: &str = "state.json";
const BACKUP_FILE: &str = "state.json.backup";
const PARTIAL_FILE: &str = "state.json.partial";
const LOCK_FILE: &str = "lock.json";

/// A lock this old belongs to a run that died without releasing it.
const STALE_LOCK_SECS: i64 = 60 * 60;

/// Contents of `state.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectState {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl ProjectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_resource(&self, key: &str) -> Option<&ResourceState> {
        self.resources.get(key)
    }

    pub fn set_resource(&mut self, key: impl Into<String>, state: ResourceState) {
        self.resources.insert(key.into(), state);
        self.updated_at = Utc::now();
    }

    pub fn remove_resource(&mut self, key: &str) -> Option<ResourceState> {
        let removed = self.resources.remove(key);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }
}

/// One resource as last read from AWS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Id used to read, update and delete, e.g. `catalog_id:name`
    pub id: String,
    pub resource_type: String,
    pub status: ResourceStatus,

    /// Lifecycle state exactly as the service reported it (`available`,
    /// `blackhole`, ...), for resources that have one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_status: Option<String>,

    pub attributes: BTreeMap<String, Value>,

    /// Declared config of the last successful apply; plans diff against it
    #[serde(default)]
    pub config: Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    /// A resource that was just read successfully: [`ResourceStatus::Active`]
    /// until told otherwise.
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Active,
            remote_status: None,
            attributes: BTreeMap::new(),
            config: Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the service's own status string and what it means here.
    pub fn with_remote_status(mut self, raw: impl Into<String>, status: ResourceStatus) -> Self {
        self.remote_status = Some(raw.into());
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Merge every key of a JSON object into the attributes
    pub fn with_attributes(mut self, value: Value) -> Self {
        if let Value::Object(map) = value {
            self.attributes.extend(map);
        }
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn attributes_value(&self) -> Value {
        Value::Object(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Where a resource is in its lifecycle, reduced from the service's status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Exists and serves traffic
    Active,
    /// Accepted but still being provisioned (`ordering`, `pending`, ...)
    Pending,
    /// Exists but the service reports it unusable (`down`, `blackhole`, ...)
    Impaired,
}

impl ResourceStatus {
    /// Classify a raw status: `active` values map to `Active`, `pending`
    /// values to `Pending`, anything else to `Impaired`. Case-insensitive.
    pub fn classify(raw: &str, active: &[&str], pending: &[&str]) -> Self {
        let matches = |values: &[&str]| values.iter().any(|v| v.eq_ignore_ascii_case(raw));
        if matches(active) {
            ResourceStatus::Active
        } else if matches(pending) {
            ResourceStatus::Pending
        } else {
            ResourceStatus::Impaired
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResourceStatus::Active => "active",
            ResourceStatus::Pending => "pending",
            ResourceStatus::Impaired => "impaired",
        })
    }
}

/// Reads and writes `<project>/.cloudrig/`
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(STATE_DIR),
        }
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// An absent state file is an empty project.
    pub async fn load(&self) -> Result<ProjectState> {
        let path = self.file(STATE_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No state at {}, starting empty", path.display());
                return Ok(ProjectState::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: ProjectState = serde_json::from_str(&content)
            .map_err(|e| CloudError::StateError(format!("{}: {e}", path.display())))?;
        if state.version > FORMAT_VERSION {
            return Err(CloudError::StateError(format!(
                "{} has format version {}, this build reads up to {FORMAT_VERSION}",
                path.display(),
                state.version
            )));
        }

        tracing::debug!("Loaded {} resources from {}", state.resources.len(), path.display());
        Ok(state)
    }

    /// Copy the current file to `state.json.backup`, then replace it by
    /// renaming a fully written `state.json.partial` over it.
    pub async fn save(&self, state: &ProjectState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.file(STATE_FILE);

        match fs::copy(&path, self.file(BACKUP_FILE)).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let partial = self.file(PARTIAL_FILE);
        fs::write(&partial, serde_json::to_vec_pretty(state)?).await?;
        fs::rename(&partial, &path).await?;

        tracing::debug!("Saved {} resources to {}", state.resources.len(), path.display());
        Ok(())
    }

    /// Take the project lock. Fails while another live run holds it; a lock
    /// older than an hour is taken over.
    pub async fn lock(&self) -> Result<StateLock> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.file(LOCK_FILE);
        let holder = LockHolder::current();
        let content = serde_json::to_vec_pretty(&holder)?;

        for takeover in [false, true] {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&content).await?;
                    file.flush().await?;
                    tracing::debug!("Locked {} for {}", self.dir.display(), holder);
                    return Ok(StateLock {
                        path,
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            match read_lock(&path).await? {
                // released between our attempt and the read
                None => continue,
                Some(existing) if existing.is_stale() && !takeover => {
                    tracing::warn!("Removing stale state lock held by {existing}");
                    remove_lock(&path).await?;
                }
                Some(existing) => {
                    return Err(CloudError::LockError(format!(
                        "state is locked by {existing}; remove {} if that run is gone",
                        path.display()
                    )));
                }
            }
        }

        Err(CloudError::LockError(format!(
            "could not take the state lock at {}",
            path.display()
        )))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockHolder {
    host: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            host: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    fn is_stale(&self) -> bool {
        Utc::now()
            .signed_duration_since(self.acquired_at)
            .num_seconds()
            >= STALE_LOCK_SECS
    }
}

impl std::fmt::Display for LockHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (pid {}) since {}", self.host, self.pid, self.acquired_at)
    }
}

/// `None` when the lock file is gone. A lock file that does not parse is
/// still being written by its holder, or was corrupted; both count as held.
async fn read_lock(path: &Path) -> Result<Option<LockHolder>> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&content).map(Some).map_err(|_| {
        CloudError::LockError(format!(
            "state is locked ({} is unreadable)",
            path.display()
        ))
    })
}

async fn remove_lock(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Held project lock; removed on [`StateLock::release`] or drop
pub struct StateLock {
    path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        remove_lock(&self.path).await?;
        tracing::debug!("Released {}", self.path.display());
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
