use super::connect_client;
use cloudrig_aws::AwsProvider;
use colored::Colorize;
use serde_json::json;

pub async fn handle(
    service_code: &str,
    quota_code: Option<String>,
    quota_name: Option<String>,
    as_json: bool,
) -> anyhow::Result<()> {
    let provider = AwsProvider::new(connect_client(None).await?, ".");

    let mut query = json!({"service_code": service_code});
    if let Some(code) = quota_code {
        query["quota_code"] = json!(code);
    }
    if let Some(name) = quota_name {
        query["quota_name"] = json!(name);
    }

    let quota = provider
        .read_data("aws_servicequotas_service_quota", &query)
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&quota.attributes)?);
        return Ok(());
    }

    let text = |key: &str| {
        quota
            .attributes
            .get(key)
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    };

    println!("{} ({})", text("quota_name").bold(), text("quota_code").cyan());
    println!("  service:     {} ({})", text("service_name"), text("service_code"));
    println!("  value:       {}", text("value").green());
    println!("  default:     {}", text("default_value"));
    println!("  adjustable:  {}", text("adjustable"));
    println!("  global:      {}", text("global_quota"));
    println!("  arn:         {}", quota.id.dimmed());
    Ok(())
}
