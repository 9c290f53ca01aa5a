mod deploy;
mod destroy;
mod doctor;
mod status;
mod template;

use std::path::PathBuf;

use runway_core::{Environment, ResourceNames, RunwayConfig};

pub use deploy::deploy;
pub use destroy::destroy;
pub use doctor::doctor;
pub use status::status;
pub use template::template;

/// Everything a command needs to address one environment.
pub(crate) struct Target {
    pub project_dir: PathBuf,
    pub config: RunwayConfig,
    pub region: String,
    pub environment: Environment,
    pub names: ResourceNames,
}

/// Resolve and validate the environment first, then load `runway.toml`,
/// so a bad name fails before anything else is touched.
pub(crate) fn resolve_target(environment: Option<&str>) -> anyhow::Result<Target> {
    let environment = Environment::from_args(environment)?;

    let project_dir = PathBuf::from(".");
    let config = RunwayConfig::load(&project_dir)?;
    let names = ResourceNames::new(&config.project.name, &environment)?;
    let region = config.project.resolve_region(env_region().as_deref());

    Ok(Target {
        project_dir,
        config,
        region,
        environment,
        names,
    })
}

/// `AWS_REGION`, when set to valid UTF-8.
pub(crate) fn env_region() -> Option<String> {
    std::env::var_os("AWS_REGION").and_then(|v| v.to_str().map(str::to_owned))
}
