//! SDK error conversion
//!
//! Service errors keep their code and message so resource modules can match
//! on them with [`CloudError::code_equals`] and [`CloudError::message_contains`].
//! Transport failures carry no code.

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use aws_smithy_types::error::operation::BuildError;
use cloudrig_core::CloudError;

/// Error codes meaning "does not exist", per service.
pub mod codes {
    pub const ECS_CLIENT_EXCEPTION: &str = "ClientException";
    pub const GLUE_ENTITY_NOT_FOUND: &str = "EntityNotFoundException";
    pub const EC2_ROUTE_TABLE_NOT_FOUND: &str = "InvalidRouteTableID.NotFound";
    pub const DX_CLIENT_EXCEPTION: &str = "DirectConnectClientException";
    pub const SERVICE_QUOTAS_NO_SUCH_RESOURCE: &str = "NoSuchResourceException";
    pub const EKS_RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
    pub const KAFKA_NOT_FOUND: &str = "NotFoundException";
    pub const GLUE_INTERNAL_FAILURE: &str = "InternalFailure";
}

/// Convert an SDK error into a [`CloudError::Api`].
pub fn sdk_error<E, R>(err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match err.code() {
        Some(code) => CloudError::Api {
            code: Some(code.to_string()),
            message: err.message().unwrap_or_default().to_string(),
        },
        None => CloudError::Api {
            code: None,
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

/// A request or model that could not be built from the declared configuration.
pub fn build_error(err: BuildError) -> CloudError {
    CloudError::InvalidConfig(err.to_string())
}

/// `Ok(None)` when the error is one of the given not-found codes.
pub fn not_found_as_none<T>(
    result: Result<T, CloudError>,
    codes: &[&str],
) -> Result<Option<T>, CloudError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if codes.iter().any(|c| e.code_equals(c)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_as_none() {
        let gone: Result<(), CloudError> =
            Err(CloudError::api(codes::GLUE_ENTITY_NOT_FOUND, "missing"));
        assert!(not_found_as_none(gone, &[codes::GLUE_ENTITY_NOT_FOUND]).unwrap().is_none());

        let other: Result<(), CloudError> = Err(CloudError::api("AccessDeniedException", "no"));
        let err = not_found_as_none(other, &[codes::GLUE_ENTITY_NOT_FOUND]).unwrap_err();
        assert!(err.code_equals("AccessDeniedException"));

        assert_eq!(not_found_as_none(Ok(3), &[]).unwrap(), Some(3));
    }

    #[test]
    fn test_build_error_is_invalid_config() {
        let err = build_error(BuildError::missing_field("name", "name is required"));
        assert!(matches!(err, CloudError::InvalidConfig(_)));
        assert!(err.to_string().contains("name"));
    }
}
