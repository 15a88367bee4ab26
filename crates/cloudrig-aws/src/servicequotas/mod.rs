//! Service Quotas

pub mod service_quota;

pub use service_quota::ServiceQuotaDataSource;
