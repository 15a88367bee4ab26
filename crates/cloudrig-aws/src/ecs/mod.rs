//! Amazon ECS: task definitions

pub mod container_definitions;
pub mod tags;
pub mod task_definition;

pub use tags::EcsTags;
pub use task_definition::{EcsTaskDefinition, TaskDefinitionSweeper};

/// ECS errors that mean a feature is unavailable to the test account, not a failure.
pub const ERROR_CHECK_SKIP_MESSAGES: &[&str] = &["Unsupported field 'inferenceAccelerators'"];
