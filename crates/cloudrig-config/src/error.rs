use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Config file not found. Looked in:\n\
        - current directory: cloudrig.local.yaml, cloudrig.yaml\n\
        - ./.cloudrig/ directory\n\
        - ~/.config/cloudrig/config.yaml\n\
        Set CLOUDRIG_CONFIG to point at a file directly"
    )]
    ConfigFileNotFound,

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("No region configured; set `region` in the config file or AWS_REGION")]
    MissingRegion,

    #[error("Invalid endpoint for {service}: {url}")]
    InvalidEndpoint { service: String, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
