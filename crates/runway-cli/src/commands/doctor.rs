use std::path::Path;

use runway_cloud::{AwsClient, CheckResult};
use runway_core::RunwayConfig;

/// Run every check and report OK/NG for each; fails if any required check fails.
pub async fn doctor() -> anyhow::Result<()> {
    let project_dir = Path::new(".");

    // A broken runway.toml is itself a finding, so fall back to defaults.
    let (config, config_check) = match RunwayConfig::load(project_dir) {
        Ok(config) if project_dir.join("runway.toml").exists() => {
            (config, CheckResult::ok("Found"))
        }
        Ok(config) => (config, CheckResult::ok("Not found (using defaults)")),
        Err(e) => (RunwayConfig::default(), CheckResult::fail(&format!("{:#}", anyhow::Error::from(e)))),
    };

    let region = config.project.resolve_region(super::env_region().as_deref());
    let client = AwsClient::new(&region);
    let mut report = client.doctor().await;
    report.config_file = config_check;

    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed — see above for details");
    }

    Ok(())
}
