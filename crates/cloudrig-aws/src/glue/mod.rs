//! AWS Glue: connections and workflows

pub mod connection;
pub mod tags;
pub mod workflow;

pub use connection::{ConnectionSweeper, GlueConnection};
pub use tags::GlueTags;
pub use workflow::{GlueWorkflow, WorkflowSweeper};
