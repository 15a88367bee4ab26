//! Amazon MSK
//!
//! Finders, status refresh functions and waiters for clusters, cluster
//! operations and configurations.

pub mod finder;
pub mod status;
pub mod tags;
pub mod wait;

pub use tags::KafkaTags;
