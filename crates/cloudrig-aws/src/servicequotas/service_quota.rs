//! `aws_servicequotas_service_quota` data source

use crate::arn::Arn;
use crate::awserr::{codes, not_found_as_none, sdk_error};
use crate::conns::AwsClient;
use async_trait::async_trait;
use aws_sdk_servicequotas::types::ServiceQuota;
use cloudrig_core::{CloudError, DataSource, ResourceState, Result};
use serde::Deserialize;
use serde_json::{Value, json};

pub const DATA_TYPE: &str = "aws_servicequotas_service_quota";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceQuotaQuery {
    pub service_code: String,
    #[serde(default)]
    pub quota_code: Option<String>,
    #[serde(default)]
    pub quota_name: Option<String>,
}

/// How a quota is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaSelector {
    Code(String),
    Name(String),
}

impl ServiceQuotaQuery {
    pub fn from_value(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| CloudError::InvalidConfig(format!("{DATA_TYPE}: {e}")))
    }

    /// Exactly one of `quota_code` and `quota_name` must be set.
    pub fn selector(&self) -> Result<QuotaSelector> {
        let code = self.quota_code.as_deref().filter(|c| !c.is_empty());
        let name = self.quota_name.as_deref().filter(|n| !n.is_empty());
        match (code, name) {
            (Some(code), None) => Ok(QuotaSelector::Code(code.to_string())),
            (None, Some(name)) => Ok(QuotaSelector::Name(name.to_string())),
            (Some(_), Some(_)) => Err(CloudError::InvalidConfig(format!(
                "{DATA_TYPE}: only one of quota_code or quota_name can be set"
            ))),
            (None, None) => Err(CloudError::InvalidConfig(format!(
                "{DATA_TYPE}: one of quota_code or quota_name must be set"
            ))),
        }
    }
}

/// Quota values are doubles; whole numbers are reported without a fraction.
fn quota_value(value: Option<f64>) -> Value {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => json!(v as i64),
        Some(v) => json!(v),
        None => Value::Null,
    }
}

pub struct ServiceQuotaDataSource {
    client: AwsClient,
}

impl ServiceQuotaDataSource {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }

    /// The applied quota, falling back to the AWS default when none is applied.
    pub async fn by_code(&self, service_code: &str, quota_code: &str) -> Result<ServiceQuota> {
        let applied = self
            .client
            .servicequotas
            .get_service_quota()
            .service_code(service_code)
            .quota_code(quota_code)
            .send()
            .await
            .map_err(sdk_error);

        let quota = match not_found_as_none(applied, &[codes::SERVICE_QUOTAS_NO_SUCH_RESOURCE])? {
            Some(output) => output.quota().cloned(),
            None => {
                tracing::debug!(
                    "No applied quota for {service_code}/{quota_code}, using the AWS default"
                );
                self.default_quota(service_code, quota_code).await?
            }
        };

        quota.ok_or_else(|| {
            CloudError::ResourceNotFound(format!("Service Quota ({service_code}/{quota_code})"))
        })
    }

    async fn default_quota(
        &self,
        service_code: &str,
        quota_code: &str,
    ) -> Result<Option<ServiceQuota>> {
        let output = self
            .client
            .servicequotas
            .get_aws_default_service_quota()
            .service_code(service_code)
            .quota_code(quota_code)
            .send()
            .await
            .map_err(|e| {
                let id = format!("{service_code}/{quota_code}");
                sdk_error(e).context(format!("error getting default Service Quota ({id})"))
            })?;
        Ok(output.quota().cloned())
    }

    /// Search applied quotas by name, then the AWS defaults.
    pub async fn by_name(&self, service_code: &str, quota_name: &str) -> Result<ServiceQuota> {
        if let Some(quota) = self.search_applied(service_code, quota_name).await? {
            return Ok(quota);
        }
        if let Some(quota) = self.search_defaults(service_code, quota_name).await? {
            return Ok(quota);
        }
        Err(CloudError::ResourceNotFound(format!(
            "Service Quota ({service_code}) with name \"{quota_name}\""
        )))
    }

    async fn search_applied(
        &self,
        service_code: &str,
        quota_name: &str,
    ) -> Result<Option<ServiceQuota>> {
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .client
                .servicequotas
                .list_service_quotas()
                .service_code(service_code)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    sdk_error(e).context(format!("error listing Service Quotas for {service_code}"))
                })?;

            if let Some(quota) = page.quotas().iter().find(|q| q.quota_name() == Some(quota_name)) {
                return Ok(Some(quota.clone()));
            }
            match page.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => return Ok(None),
            }
        }
    }

    async fn search_defaults(
        &self,
        service_code: &str,
        quota_name: &str,
    ) -> Result<Option<ServiceQuota>> {
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .client
                .servicequotas
                .list_aws_default_service_quotas()
                .service_code(service_code)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    sdk_error(e).context(format!(
                        "error listing default Service Quotas for {service_code}"
                    ))
                })?;

            if let Some(quota) = page.quotas().iter().find(|q| q.quota_name() == Some(quota_name)) {
                return Ok(Some(quota.clone()));
            }
            match page.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => return Ok(None),
            }
        }
    }

    /// Default quotas carry no account in their ARN; report it in the caller's account.
    fn quota_arn(&self, quota: &ServiceQuota, service_code: &str, quota_code: &str) -> String {
        match quota.quota_arn().and_then(|a| a.parse::<Arn>().ok()) {
            Some(arn) if !arn.account_id.is_empty() => arn.to_string(),
            _ => self
                .client
                .regional_arn("servicequotas", &format!("{service_code}/{quota_code}")),
        }
    }
}

#[async_trait]
impl DataSource for ServiceQuotaDataSource {
    fn data_type(&self) -> &str {
        DATA_TYPE
    }

    async fn read(&self, config: &Value) -> Result<ResourceState> {
        let query = ServiceQuotaQuery::from_value(config)?;
        let service_code = query.service_code.as_str();

        let quota = match query.selector()? {
            QuotaSelector::Code(code) => self.by_code(service_code, &code).await?,
            QuotaSelector::Name(name) => self.by_name(service_code, &name).await?,
        };

        let quota_code = quota.quota_code().unwrap_or_default().to_string();
        let default_value = self
            .default_quota(service_code, &quota_code)
            .await?
            .and_then(|d| d.value());
        let arn = self.quota_arn(&quota, service_code, &quota_code);

        Ok(ResourceState::new(arn.clone(), DATA_TYPE)
            .with_attributes(json!({
                "adjustable": quota.adjustable(),
                "arn": arn,
                "default_value": quota_value(default_value),
                "global_quota": quota.global_quota(),
                "quota_code": quota_code,
                "quota_name": quota.quota_name(),
                "service_code": quota.service_code().unwrap_or(service_code),
                "service_name": quota.service_name(),
                "value": quota_value(quota.value()),
            })))
    }
}
