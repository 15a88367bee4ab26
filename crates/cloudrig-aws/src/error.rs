//! AWS provider error types

use cloudrig_core::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("Provider configuration error: {0}")]
    Config(#[from] cloudrig_config::ConfigError),

    #[error("Unable to determine AWS account ID: {0}")]
    AccountId(String),

    #[error("Invalid ARN ({arn}): {reason}")]
    InvalidArn { arn: String, reason: String },

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),
}

pub type Result<T> = std::result::Result<T, AwsError>;

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::CloudError(inner) => inner,
            AwsError::Config(e) => CloudError::InvalidConfig(e.to_string()),
            AwsError::AccountId(msg) => CloudError::AuthenticationFailed(msg),
            AwsError::InvalidArn { arn, reason } => CloudError::InvalidId { id: arn, reason },
        }
    }
}
