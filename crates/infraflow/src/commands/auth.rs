use colored::Colorize;
use infraflow_cloud::CloudProvider;
use infraflow_cloud_cloudstack::CloudStackProvider;
use infraflow_config::{CredentialStore, CredentialType};

pub async fn handle(env: &str) -> anyhow::Result<()> {
    let settings = infraflow_config::load_settings()?;
    let cloud = settings.get_credentials_for(env, CredentialType::Cloud)?;

    println!("Profile: {}", cloud.endpoint.cyan());
    let provider = CloudStackProvider::new(cloud.endpoint.clone());
    let status = provider.check_auth().await?;

    if status.authenticated {
        println!(
            "{} {}",
            "✓ Authenticated:".green(),
            status.account_info.unwrap_or_default()
        );
        Ok(())
    } else {
        println!("{}", "✗ Not authenticated".red().bold());
        anyhow::bail!(
            "{}",
            status
                .error
                .unwrap_or_else(|| "unknown authentication error".to_string())
        )
    }
}
