pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing at a config file
pub const CONFIG_PATH_ENV: &str = "CLOUDRIG_CONFIG";

const CANDIDATES: [&str; 2] = ["cloudrig.local.yaml", "cloudrig.yaml"];

/// Provider settings shared by every command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub region: Option<String>,

    /// Named profile from the shared credentials file
    pub profile: Option<String>,

    /// Per-service endpoint overrides, e.g. `glue: http://localhost:4566`
    pub endpoints: BTreeMap<String, String>,

    /// Tags added to every taggable resource
    pub default_tags: BTreeMap<String, String>,

    /// Tags that are never diffed against the remote set
    pub ignore_tags: IgnoreTags,

    /// Waiter timeout in seconds
    pub default_timeout: Option<u64>,

    /// Seconds between state polls; exponential backoff when unset
    pub poll_interval: Option<u64>,

    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IgnoreTags {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

impl ProviderConfig {
    pub fn from_yaml(path: &Path, content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(path, &content)?;
        config.validate()?;
        Ok(config)
    }

    /// `AWS_REGION` (or `AWS_DEFAULT_REGION`) and `AWS_PROFILE` win over the file.
    pub fn apply_env_overrides(&mut self) {
        let region = non_empty_env("AWS_REGION").or_else(|| non_empty_env("AWS_DEFAULT_REGION"));
        if let Some(region) = region {
            self.region = Some(region);
        }
        if let Some(profile) = non_empty_env("AWS_PROFILE") {
            self.profile = Some(profile);
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (service, url) in &self.endpoints {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidEndpoint {
                    service: service.clone(),
                    url: url.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn region(&self) -> Result<&str> {
        self.region.as_deref().ok_or(ConfigError::MissingRegion)
    }

    pub fn endpoint(&self, service: &str) -> Option<&str> {
        self.endpoints.get(service).map(String::as_str)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.default_timeout.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval.map(Duration::from_secs)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get the cloudrig config directory
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("cloudrig");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Find the provider config file
///
/// Search order:
/// 1. `CLOUDRIG_CONFIG` environment variable
/// 2. current directory: cloudrig.local.yaml, cloudrig.yaml
/// 3. the same names inside ./.cloudrig/
/// 4. ~/.config/cloudrig/config.yaml
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".cloudrig");
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("cloudrig").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Load the discovered config file, or defaults when there is none, then
/// apply environment overrides.
pub fn load() -> Result<ProviderConfig> {
    let mut config = match find_config_file() {
        Ok(path) => {
            tracing::debug!("Loading provider config from {}", path.display());
            ProviderConfig::from_file(&path)?
        }
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No provider config file found, using defaults");
            ProviderConfig::default()
        }
        Err(e) => return Err(e),
    };
    config.apply_env_overrides();
    Ok(config)
}
