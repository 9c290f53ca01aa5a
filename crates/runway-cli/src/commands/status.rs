use std::time::Duration;

use runway_build::template::{SERVICE_ARN_OUTPUT, SERVICE_URL_OUTPUT};
use runway_cloud::{AwsClient, HealthProbe};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Show stack status and service URL, optionally probing `/health`.
pub async fn status(environment: Option<&str>, probe: bool) -> anyhow::Result<()> {
    let target = super::resolve_target(environment)?;
    let stack = target.names.stack.as_str();

    let client = AwsClient::new(&target.region);
    let presence = client.probe_stack(stack).await;

    println!("Environment: {}", target.environment);
    println!("Stack:       {stack} ({})", target.region);
    println!("Status:      {presence}");

    if presence.needs_bootstrap() {
        println!();
        println!("Not deployed. Run: runway deploy {}", target.environment);
        return Ok(());
    }

    if let Some(arn) = client.stack_output(stack, SERVICE_ARN_OUTPUT).await? {
        println!("Service:     {arn}");
    }

    let Some(url) = client.stack_output(stack, SERVICE_URL_OUTPUT).await? else {
        println!("URL:         not available yet");
        return Ok(());
    };
    println!("URL:         {url}");

    if probe {
        let report = HealthProbe::new(PROBE_TIMEOUT)?.probe(&url).await?;
        println!("Health:      HTTP {} {}", report.status, report.body.trim());
        if !report.is_healthy() {
            anyhow::bail!("health check at {} returned HTTP {}", report.url, report.status);
        }
    }

    Ok(())
}
