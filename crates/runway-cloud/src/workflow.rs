//! The deploy workflow: preflight, probe, bootstrap, publish, converge, report.
//!
//! Steps run strictly in sequence and the first failure aborts the run.
//! When a lease table is configured, everything after preflight runs under
//! the environment's deploy lease, which is released on every exit path.

use std::path::Path;

use runway_build::archive::{ARCHIVE_NAME, ArchiveError, create_archive};
use runway_build::buildspec::{BUILDSPEC_NAME, BuildSpecError};
use runway_build::policy::{codebuild_role_policy, codebuild_trust_policy};
use runway_build::template::{REPOSITORY_URI_OUTPUT, SERVICE_URL_OUTPUT};
use runway_build::{BuildSpecGenerator, StackParameters, StackTemplate};
use runway_core::{
    BuildConfig, Environment, IMAGE_TAG, ImageRef, PublishStrategy, ResourceNames, RunwayConfig,
};
use tempfile::TempDir;

use crate::client::{AwsClient, CallerIdentity, PreflightError, StackError};
use crate::codebuild::{BuildError, BuildProject, PollPolicy};
use crate::executor::CommandExecutor;
use crate::lock::LockError;
use crate::registry::PublishError;

const TEMPLATE_FILE: &str = "template.json";

/// Inputs of one deploy run, already resolved and validated.
#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
    pub environment: &'a Environment,
    pub names: &'a ResourceNames,
    pub secrets_arn: Option<&'a str>,
    pub strategy: PublishStrategy,
    pub project_dir: &'a Path,
}

/// Result of a successful deploy run.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub environment: String,
    pub stack_name: String,
    pub bootstrapped: bool,
    pub image_uri: String,
    /// `None` when the stack has no `ServiceUrl` output yet.
    pub endpoint: Option<String>,
    pub steps: Vec<String>,
}

impl DeployOutcome {
    /// What the operator should try next.
    pub fn next_steps(&self, region: &str) -> Vec<String> {
        match &self.endpoint {
            Some(url) => vec![
                format!("Service URL: {url}"),
                format!("Check health: curl {}", crate::health::health_url(url)),
            ],
            None => vec![
                "Service URL not available yet; the service may still be starting.".to_owned(),
                format!("App Runner console: https://{region}.console.aws.amazon.com/apprunner/home?region={region}#/services"),
            ],
        }
    }
}

/// Run the full deploy workflow for one environment.
pub async fn deploy<E: CommandExecutor>(
    client: &AwsClient<E>,
    config: &RunwayConfig,
    request: &DeployRequest<'_>,
) -> Result<DeployOutcome, WorkflowError> {
    let mut steps = Vec::new();

    // Preflight
    let identity = client.check_identity().await?;
    tracing::info!(account = %identity.account, arn = %identity.arn, "authenticated");
    if request.strategy == PublishStrategy::Local {
        client.check_build_daemon().await?;
    }
    steps.push(format!("Preflight passed ({})", identity.arn));

    // Lease
    let lease = match &config.lock.table {
        Some(table) => Some(
            client
                .acquire_lease(table, request.environment.as_str(), config.lock.ttl_secs)
                .await?,
        ),
        None => {
            tracing::warn!("no [lock].table configured, concurrent deploys are not prevented");
            None
        }
    };

    let result = deploy_locked(client, config, request, &identity, &mut steps).await;

    if let Some(lease) = &lease {
        if let Err(e) = client.release_lease(lease).await {
            tracing::warn!(error = %e, "failed to release deploy lease; it expires on its own");
        }
    }

    let (bootstrapped, image_uri, endpoint) = result?;

    Ok(DeployOutcome {
        environment: request.environment.to_string(),
        stack_name: request.names.stack.clone(),
        bootstrapped,
        image_uri,
        endpoint,
        steps,
    })
}

async fn deploy_locked<E: CommandExecutor>(
    client: &AwsClient<E>,
    config: &RunwayConfig,
    request: &DeployRequest<'_>,
    identity: &CallerIdentity,
    steps: &mut Vec<String>,
) -> Result<(bool, String, Option<String>), WorkflowError> {
    let stack = request.names.stack.as_str();
    let env = request.environment.as_str();
    let prefix = config.project.name.as_str();
    let workdir = tempfile::Builder::new()
        .prefix("runway-")
        .tempdir()
        .map_err(|e| WorkflowError::Workspace { source: e })?;

    // Probe
    let presence = client.probe_stack(stack).await;
    tracing::info!(%stack, %presence, "stack probed");

    // Bootstrap: repository only, so an image exists before the service
    let bootstrapped = presence.needs_bootstrap();
    if bootstrapped {
        tracing::info!(%stack, "stack not found, bootstrapping image repository");
        let template = StackTemplate::new(prefix, &config.service, false);
        let path = write_template(&workdir, &template)?;
        client
            .deploy_stack(stack, &path, &StackParameters::bootstrap(env).overrides())
            .await?;
        steps.push("Bootstrapped image repository".to_owned());
    }

    let repository_uri = client
        .stack_output(stack, REPOSITORY_URI_OUTPUT)
        .await?
        .ok_or_else(|| WorkflowError::MissingRepositoryUri {
            stack: stack.to_owned(),
        })?;
    let image = ImageRef::parse(&repository_uri)?;

    // Publish
    let image_uri = match request.strategy {
        PublishStrategy::Local => {
            let build = resolve_build_paths(&config.build, request.project_dir);
            client.publish_local(&build, &image).await?
        }
        PublishStrategy::Remote => {
            publish_remote(client, config, request, identity, &image, &workdir).await?
        }
    };
    steps.push(format!("Published {image_uri} ({} build)", request.strategy));

    // Converge
    tracing::info!(%stack, "deploying service");
    let template = StackTemplate::new(prefix, &config.service, request.secrets_arn.is_some());
    let path = write_template(&workdir, &template)?;
    // createService=true is explicit; an omitted parameter keeps the bootstrap's false
    let parameters = StackParameters::full(env, request.secrets_arn);
    client
        .deploy_stack(stack, &path, &parameters.overrides())
        .await?;
    steps.push(format!("Stack {stack} converged"));

    // Report
    let endpoint = client.stack_output(stack, SERVICE_URL_OUTPUT).await?;

    Ok((bootstrapped, image_uri, endpoint))
}

/// Package the source, hand it to CodeBuild, and wait for the push.
async fn publish_remote<E: CommandExecutor>(
    client: &AwsClient<E>,
    config: &RunwayConfig,
    request: &DeployRequest<'_>,
    identity: &CallerIdentity,
    image: &ImageRef,
    workdir: &TempDir,
) -> Result<String, WorkflowError> {
    let build = &config.build;
    let names = request.names;
    let region = client.region();

    let archive = create_archive(request.project_dir, workdir.path(), &build.exclude)?;
    tracing::info!(files = archive.file_count, "source archived");

    let buildspec = BuildSpecGenerator::new(build, image, region).render()?;
    let buildspec_path = workdir.path().join(BUILDSPEC_NAME);
    std::fs::write(&buildspec_path, buildspec).map_err(|e| WorkflowError::Workspace { source: e })?;

    let bucket = ResourceNames::artifact_bucket(&identity.account, region);
    client.ensure_bucket(&bucket).await?;

    let role_policy =
        codebuild_role_policy(&identity.account, region, &config.project.name, &bucket);
    let (role_arn, _created) = client
        .ensure_codebuild_role(&names.codebuild_role, &codebuild_trust_policy(), &role_policy)
        .await?;

    let source_key = names.artifact_key(ARCHIVE_NAME);
    let buildspec_key = names.artifact_key(BUILDSPEC_NAME);
    let source_location = format!("{bucket}/{source_key}");

    client
        .ensure_codebuild_project(&BuildProject {
            name: &names.codebuild_project,
            service_role_arn: &role_arn,
            image: &build.codebuild_image,
            compute_type: &build.compute_type,
            source_location: &source_location,
        })
        .await?;

    client.upload(&archive.path, &bucket, &source_key).await?;
    client.upload(&buildspec_path, &bucket, &buildspec_key).await?;

    let build_id = client
        .start_build(&names.codebuild_project, &bucket, &source_key, &buildspec_key)
        .await?;
    tracing::info!(
        %build_id,
        logs = %client.build_console_url(&names.codebuild_project, &build_id),
        "remote build started"
    );

    client
        .wait_for_build(&build_id, &names.codebuild_project, PollPolicy::from(build))
        .await?;

    Ok(image.tagged(IMAGE_TAG))
}

fn write_template(
    workdir: &TempDir,
    template: &StackTemplate<'_>,
) -> Result<std::path::PathBuf, WorkflowError> {
    let json = template
        .to_json()
        .map_err(|e| WorkflowError::Template { source: e })?;
    let path = workdir.path().join(TEMPLATE_FILE);
    std::fs::write(&path, json).map_err(|e| WorkflowError::Workspace { source: e })?;
    Ok(path)
}

/// Docker resolves `-f` and the context against the working directory,
/// while `runway.toml` paths are relative to the project.
fn resolve_build_paths(build: &BuildConfig, project_dir: &Path) -> BuildConfig {
    BuildConfig {
        context: project_dir.join(&build.context).display().to_string(),
        dockerfile: project_dir.join(&build.dockerfile).display().to_string(),
        ..build.clone()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Preflight(#[from] PreflightError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Stack(#[from] StackError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    BuildSpec(#[from] BuildSpecError),

    #[error(transparent)]
    Image(#[from] runway_core::Error),

    #[error("failed to render stack template")]
    Template { source: serde_json::Error },

    #[error("failed to prepare working directory")]
    Workspace { source: std::io::Error },

    #[error("stack {stack} has no RepositoryUri output — was it created by runway?")]
    MissingRepositoryUri { stack: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_paths_are_joined_to_project_dir() {
        let build = BuildConfig {
            context: "app".to_owned(),
            dockerfile: "docker/Dockerfile".to_owned(),
            ..Default::default()
        };
        let resolved = resolve_build_paths(&build, Path::new("/work/shop"));
        assert_eq!(resolved.context, "/work/shop/app");
        assert_eq!(resolved.dockerfile, "/work/shop/docker/Dockerfile");
        assert_eq!(resolved.platform, build.platform);
    }

    #[test]
    fn next_steps_without_endpoint_point_to_console() {
        let outcome = DeployOutcome {
            environment: "dev".to_owned(),
            stack_name: "app-dev".to_owned(),
            bootstrapped: false,
            image_uri: "x".to_owned(),
            endpoint: None,
            steps: vec![],
        };
        let lines = outcome.next_steps("eu-west-1");
        assert!(lines[1].contains("eu-west-1.console.aws.amazon.com/apprunner"));
    }
}
