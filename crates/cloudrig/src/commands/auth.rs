use super::connect_client;
use cloudrig_aws::AwsProvider;
use cloudrig_core::CloudProvider;
use colored::Colorize;

pub async fn handle() -> anyhow::Result<()> {
    let client = connect_client(None).await?;
    let region = client.region.clone();
    let provider = AwsProvider::new(client, ".");

    let status = provider.check_auth().await?;
    if status.authenticated {
        println!(
            "{} {} in {}",
            "✓".green(),
            status.account_info.as_deref().unwrap_or_default(),
            region.cyan()
        );
        Ok(())
    } else {
        anyhow::bail!(
            "{} is not authenticated: {}",
            provider.display_name(),
            status.error.as_deref().unwrap_or("unknown error")
        )
    }
}
