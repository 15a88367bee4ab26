//! Provider error types

use thiserror::Error;

/// Provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource type not supported: {0}")]
    UnsupportedResource(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// An error returned by the vendor API, carried verbatim.
    #[error("{}", format_api_error(.code.as_deref(), .message))]
    Api {
        code: Option<String>,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid resource ID ({id}): {reason}")]
    InvalidId { id: String, reason: String },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error(
        "timeout while waiting for state to become '{expected}' \
         (last state: '{last_state}', timeout: {timeout:?})"
    )]
    Timeout {
        last_state: String,
        expected: String,
        timeout: std::time::Duration,
    },

    #[error("unexpected state '{state}', wanted target '{expected}'")]
    UnexpectedState { state: String, expected: String },

    #[error("Check failed: {0}")]
    CheckFailed(String),

    #[error("couldn't find resource (after {retries} retries)")]
    NotFoundAfterRetries { retries: u32 },

    /// Wraps an error with the operation that produced it.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<CloudError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_api_error(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

impl CloudError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Attach the failing operation to this error.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root(&self) -> &CloudError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// The vendor error code, if this is an API error.
    pub fn code(&self) -> Option<&str> {
        match self.root() {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Whether the error means the resource does not exist (anymore).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Self::ResourceNotFound(_) | Self::NotFoundAfterRetries { .. }
        )
    }

    /// API error whose code is exactly `code`.
    pub fn code_equals(&self, code: &str) -> bool {
        self.code() == Some(code)
    }

    /// API error whose code is `code` and whose message contains `needle`.
    /// An empty needle matches any message.
    pub fn message_contains(&self, code: &str, needle: &str) -> bool {
        match self.root() {
            Self::Api {
                code: Some(c),
                message,
            } => c == code && message.contains(needle),
            _ => false,
        }
    }

    /// Whether any part of the rendered error contains `needle`.
    pub fn text_contains(&self, needle: &str) -> bool {
        self.to_string().contains(needle)
    }

    /// Turn an API error carrying one of `codes` into `ResourceNotFound`.
    pub fn not_found_codes(self, codes: &[&str], id: &str) -> Self {
        if codes.iter().any(|c| self.code_equals(c)) {
            Self::ResourceNotFound(id.to_string())
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = CloudError::api("EntityNotFoundException", "Connection not found");
        assert_eq!(
            err.to_string(),
            "EntityNotFoundException: Connection not found"
        );
    }

    #[test]
    fn test_message_contains() {
        let err = CloudError::api("ClientException", "Unable to describe task definition.");
        assert!(err.message_contains("ClientException", ""));
        assert!(err.message_contains("ClientException", "Unable to describe"));
        assert!(!err.message_contains("ClientException", "Role is not valid"));
        assert!(!err.message_contains("ServerException", ""));
    }

    #[test]
    fn test_context_keeps_code() {
        let err = CloudError::api("ResourceNotFoundException", "gone")
            .context("error reading EKS Cluster (test)");
        assert!(err.code_equals("ResourceNotFoundException"));
        assert_eq!(
            err.to_string(),
            "error reading EKS Cluster (test): ResourceNotFoundException: gone"
        );
    }

    #[test]
    fn test_not_found_codes() {
        let err = CloudError::api("InvalidRouteTableID.NotFound", "no such table")
            .not_found_codes(&["InvalidRouteTableID.NotFound"], "lgw-rtb-1_10.0.0.0/16");
        assert!(err.is_not_found());

        let err = CloudError::api("UnauthorizedOperation", "denied")
            .not_found_codes(&["InvalidRouteTableID.NotFound"], "x");
        assert!(!err.is_not_found());
    }
}
