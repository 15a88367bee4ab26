//! cloudrig core
//!
//! Vendor-neutral plumbing shared by every provider crate: the resource
//! module traits, the plan/apply engine, the JSON state store, tag
//! reconciliation, state polling, retries, sweepers and the acceptance-test
//! harness.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  cloudrig CLI                    │
//! │          (plan / apply / destroy / sweep)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                cloudrig-core                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait CloudProvider / ResourceModule     │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐    │
//! │  │  engine  │ │  state   │ │ tags, waiter │    │
//! │  └──────────┘ └──────────┘ └──────────────┘    │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │ cloudrig-aws  │
//!           └───────────────┘
//! ```

pub mod acctest;
pub mod action;
pub mod engine;
pub mod error;
pub mod provider;
pub mod retry;
pub mod state;
pub mod sweep;
pub mod tags;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod waiter;

// Re-exports
pub use action::{Action, ActionOutcome, ActionType, ApplyResult, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use provider::{
    AuthStatus, CloudProvider, DataSource, Manifest, ResourceConfig, ResourceModule,
    ResourceRegistry, ResourceSet, RetryConfig,
};
pub use state::{ProjectState, ResourceState, ResourceStatus, StateLock, StateStore};
pub use sweep::{SweepReport, SweepSummary, Sweeper, SweeperRegistry};
pub use tags::{IgnoreConfig, KeyValueTags, TagPolicy, TagService, update_tags};
pub use waiter::{Refreshed, StateChangeConf};
