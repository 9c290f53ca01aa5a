use runway_cloud::AwsClient;
use runway_cloud::workflow::{self, DeployRequest};
use runway_core::PublishStrategy;

/// Run the deploy workflow for one environment.
pub async fn deploy(
    environment: Option<&str>,
    strategy: Option<PublishStrategy>,
    secrets_arn: Option<&str>,
) -> anyhow::Result<()> {
    let target = super::resolve_target(environment)?;
    let strategy = strategy.unwrap_or(target.config.build.strategy);
    let secrets_arn = secrets_arn.map(str::trim).filter(|arn| !arn.is_empty());

    println!(
        "Deploying '{}' as stack {} in {} ({strategy} build)",
        target.environment, target.names.stack, target.region
    );
    if secrets_arn.is_none() {
        println!("No secrets ARN given; the service starts without database credentials.");
    }

    let client = AwsClient::new(&target.region);
    let request = DeployRequest {
        environment: &target.environment,
        names: &target.names,
        secrets_arn,
        strategy,
        project_dir: &target.project_dir,
    };
    let outcome = workflow::deploy(&client, &target.config, &request).await?;

    println!();
    for step in &outcome.steps {
        println!("  ✓ {step}");
    }
    println!();
    for line in outcome.next_steps(&target.region) {
        println!("{line}");
    }

    Ok(())
}
