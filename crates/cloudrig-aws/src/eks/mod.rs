//! Amazon EKS
//!
//! Finders, status refresh functions and waiters for clusters, add-ons,
//! node groups, Fargate profiles and OIDC identity provider configs.

pub mod finder;
pub mod status;
pub mod tags;
pub mod wait;

pub use tags::EksTags;
