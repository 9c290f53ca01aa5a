use std::path::Path;

use runway_build::StackTemplate;
use runway_core::RunwayConfig;

/// Print the CloudFormation template deploys converge to.
pub fn template(secrets_arn: Option<&str>) -> anyhow::Result<()> {
    let config = RunwayConfig::load(Path::new("."))?;
    let with_secrets = secrets_arn.is_some_and(|arn| !arn.trim().is_empty());

    let template = StackTemplate::new(&config.project.name, &config.service, with_secrets);
    println!("{}", template.to_json()?);

    Ok(())
}
