//! AWS provider for cloudrig
//!
//! Resource modules, data sources, sweepers and tag services backed by the
//! AWS SDK for Rust.
//!
//! # Resources
//!
//! - `aws_glue_connection`, `aws_glue_workflow`
//! - `aws_ecs_task_definition`
//! - `aws_ec2_local_gateway_route`
//! - `aws_dx_hosted_connection`
//!
//! # Data sources
//!
//! - `aws_servicequotas_service_quota`
//!
//! # Example
//!
//! ```ignore
//! use cloudrig_aws::{AwsClient, AwsProvider};
//! use cloudrig_config::ProviderConfig;
//! use cloudrig_core::CloudProvider;
//!
//! let config = ProviderConfig::from_file("cloudrig.yaml")?;
//! let client = AwsClient::new(&config).await?;
//! let provider = AwsProvider::new(client, ".");
//!
//! let auth = provider.check_auth().await?;
//! let plan = provider.plan(&resources).await?;
//! ```

pub mod arn;
pub mod awserr;
pub mod conns;
pub mod directconnect;
pub mod ec2;
pub mod ecs;
pub mod eks;
pub mod error;
pub mod glue;
pub mod kafka;
pub mod pinpoint;
pub mod provider;
pub mod resourcegroups;
pub mod servicequotas;

pub use conns::AwsClient;
pub use error::{AwsError, Result};
pub use provider::{AwsProvider, registry, sweepers, tag_service_for_arn};
