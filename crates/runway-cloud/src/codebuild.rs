use std::fmt;
use std::path::Path;
use std::time::Duration;

use runway_core::BuildConfig;
use serde_json::Value;

use crate::client::{AwsClient, args, non_sentinel};
use crate::command::CommandError;
use crate::executor::CommandExecutor;

/// Time given to IAM to propagate a freshly created role before CodeBuild
/// is allowed to assume it.
pub const IAM_SETTLE: Duration = Duration::from_secs(10);

const ROLE_POLICY_NAME: &str = "runway-codebuild";

/// Status of a CodeBuild job as reported by `batch-get-builds`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    InProgress,
    Succeeded,
    Failed,
    Fault,
    TimedOut,
    Stopped,
    /// Anything the service reports that runway does not know; non-terminal.
    Other(String),
}

impl BuildStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "IN_PROGRESS" => Self::InProgress,
            "SUCCEEDED" => Self::Succeeded,
            "FAILED" => Self::Failed,
            "FAULT" | "FAULTED" => Self::Fault,
            "TIMED_OUT" => Self::TimedOut,
            "STOPPED" => Self::Stopped,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress | Self::Other(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Fault => "FAULT",
            Self::TimedOut => "TIMED_OUT",
            Self::Stopped => "STOPPED",
            Self::Other(s) => s,
        })
    }
}

/// How often to ask for the build status, and when to stop asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl From<&BuildConfig> for PollPolicy {
    fn from(build: &BuildConfig) -> Self {
        Self {
            interval: Duration::from_secs(build.poll_interval_secs),
            max_wait: Duration::from_secs(build.max_wait_secs),
        }
    }
}

/// Settings for the shared image-build project.
#[derive(Debug, Clone)]
pub struct BuildProject<'a> {
    pub name: &'a str,
    pub service_role_arn: &'a str,
    pub image: &'a str,
    pub compute_type: &'a str,
    /// Initial source location (`bucket/key`); every build overrides it.
    pub source_location: &'a str,
}

impl<E: CommandExecutor> AwsClient<E> {
    // ── S3 ──

    /// Ensure the artifact bucket exists. Returns `true` when it was created.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<bool, BuildError> {
        let exists = self
            .aws(args(["s3api", "head-bucket", "--bucket", bucket]))
            .await
            .is_ok();
        if exists {
            return Ok(false);
        }

        tracing::info!(%bucket, "creating artifact bucket");
        self.aws(args(["s3", "mb", &format!("s3://{bucket}")]))
            .await
            .map_err(|e| BuildError::Bucket {
                bucket: bucket.to_owned(),
                source: e,
            })?;

        Ok(true)
    }

    /// Upload a file to `s3://<bucket>/<key>`.
    pub async fn upload(&self, path: &Path, bucket: &str, key: &str) -> Result<(), BuildError> {
        let local = path
            .to_str()
            .ok_or_else(|| BuildError::InvalidPath(path.to_path_buf()))?;

        self.aws(args([
            "s3",
            "cp",
            local,
            &format!("s3://{bucket}/{key}"),
            "--only-show-errors",
        ]))
        .await
        .map_err(|e| BuildError::Upload {
            key: key.to_owned(),
            source: e,
        })?;

        Ok(())
    }

    // ── IAM ──

    /// Ensure the CodeBuild service role exists and carries the current
    /// inline policy. Returns the role ARN and whether it was just created.
    ///
    /// A new role is not assumable right away; this waits [`IAM_SETTLE`]
    /// after creating one.
    pub async fn ensure_codebuild_role(
        &self,
        role: &str,
        trust_policy: &Value,
        role_policy: &Value,
    ) -> Result<(String, bool), BuildError> {
        let role_err = |e| BuildError::Role {
            role: role.to_owned(),
            source: e,
        };

        let existing = self
            .aws(args([
                "iam",
                "get-role",
                "--role-name",
                role,
                "--query",
                "Role.Arn",
                "--output",
                "text",
            ]))
            .await;

        let (arn, created) = match existing {
            Ok(arn) => (arn.trim().to_owned(), false),
            Err(e) if e.stderr_contains("NoSuchEntity") => {
                tracing::info!(%role, "creating CodeBuild service role");
                let arn = self
                    .aws(args([
                        "iam",
                        "create-role",
                        "--role-name",
                        role,
                        "--assume-role-policy-document",
                        &trust_policy.to_string(),
                        "--query",
                        "Role.Arn",
                        "--output",
                        "text",
                    ]))
                    .await
                    .map_err(role_err)?;
                (arn.trim().to_owned(), true)
            }
            Err(e) => return Err(role_err(e)),
        };

        self.aws(args([
            "iam",
            "put-role-policy",
            "--role-name",
            role,
            "--policy-name",
            ROLE_POLICY_NAME,
            "--policy-document",
            &role_policy.to_string(),
        ]))
        .await
        .map_err(role_err)?;

        if created {
            tracing::info!(settle_secs = IAM_SETTLE.as_secs(), "waiting for IAM propagation");
            tokio::time::sleep(IAM_SETTLE).await;
        }

        Ok((arn, created))
    }

    // ── CodeBuild ──

    /// Ensure the image-build project exists. Returns `true` when it was created.
    pub async fn ensure_codebuild_project(
        &self,
        project: &BuildProject<'_>,
    ) -> Result<bool, BuildError> {
        let project_err = |e| BuildError::Project {
            project: project.name.to_owned(),
            source: e,
        };

        let found = self
            .aws(args([
                "codebuild",
                "batch-get-projects",
                "--names",
                project.name,
                "--query",
                "projects[0].name",
                "--output",
                "text",
            ]))
            .await
            .map_err(project_err)?;
        if non_sentinel(&found).is_some() {
            return Ok(false);
        }

        tracing::info!(project = %project.name, "creating CodeBuild project");
        self.aws(args([
            "codebuild",
            "create-project",
            "--name",
            project.name,
            "--source",
            &format!("type=S3,location={}", project.source_location),
            "--artifacts",
            "type=NO_ARTIFACTS",
            "--environment",
            &format!(
                "type=LINUX_CONTAINER,image={},computeType={},privilegedMode=true",
                project.image, project.compute_type
            ),
            "--service-role",
            project.service_role_arn,
        ]))
        .await
        .map_err(project_err)?;

        Ok(true)
    }

    /// Start a build from the uploaded source and buildspec. Returns the build id.
    pub async fn start_build(
        &self,
        project: &str,
        bucket: &str,
        source_key: &str,
        buildspec_key: &str,
    ) -> Result<String, BuildError> {
        let build_id = self
            .aws(args([
                "codebuild",
                "start-build",
                "--project-name",
                project,
                "--source-type-override",
                "S3",
                "--source-location-override",
                &format!("{bucket}/{source_key}"),
                "--buildspec-override",
                &format!("arn:aws:s3:::{bucket}/{buildspec_key}"),
                "--query",
                "build.id",
                "--output",
                "text",
            ]))
            .await
            .map_err(|e| BuildError::Start { source: e })?;

        non_sentinel(&build_id).ok_or(BuildError::MissingBuildId)
    }

    pub async fn build_status(&self, build_id: &str) -> Result<BuildStatus, BuildError> {
        let status = self
            .aws(args([
                "codebuild",
                "batch-get-builds",
                "--ids",
                build_id,
                "--query",
                "builds[0].buildStatus",
                "--output",
                "text",
            ]))
            .await
            .map_err(|e| BuildError::Status {
                build_id: build_id.to_owned(),
                source: e,
            })?;

        Ok(BuildStatus::parse(&status))
    }

    /// Poll until the build reaches a terminal status.
    ///
    /// Returns `JobFailed` for any unsuccessful terminal status and
    /// `ClientTimeout` once `policy.max_wait` has elapsed without one.
    pub async fn wait_for_build(
        &self,
        build_id: &str,
        project: &str,
        policy: PollPolicy,
    ) -> Result<(), BuildError> {
        let started = tokio::time::Instant::now();

        loop {
            let status = self.build_status(build_id).await?;

            if status.is_success() {
                tracing::info!(%build_id, "build succeeded");
                return Ok(());
            }
            if status.is_terminal() {
                return Err(BuildError::JobFailed {
                    status: status.to_string(),
                    console_url: self.build_console_url(project, build_id),
                });
            }

            let waited = started.elapsed();
            if waited >= policy.max_wait {
                return Err(BuildError::ClientTimeout {
                    build_id: build_id.to_owned(),
                    waited,
                });
            }

            tracing::info!(%build_id, %status, elapsed_secs = waited.as_secs(), "build in progress");
            tokio::time::sleep(policy.interval).await;
        }
    }

    pub fn build_console_url(&self, project: &str, build_id: &str) -> String {
        let region = self.region();
        format!(
            "https://{region}.console.aws.amazon.com/codesuite/codebuild/projects/{project}/build/{}/?region={region}",
            urlencoding::encode(build_id)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),

    #[error("failed to create artifact bucket {bucket}")]
    Bucket { bucket: String, source: CommandError },

    #[error("failed to upload {key}")]
    Upload { key: String, source: CommandError },

    #[error("failed to prepare IAM role {role}")]
    Role { role: String, source: CommandError },

    #[error("failed to prepare CodeBuild project {project}")]
    Project { project: String, source: CommandError },

    #[error("failed to start build")]
    Start { source: CommandError },

    #[error("start-build returned no build id")]
    MissingBuildId,

    #[error("failed to read status of build {build_id}")]
    Status { build_id: String, source: CommandError },

    #[error("remote build finished with status {status}\n  Logs: {console_url}")]
    JobFailed { status: String, console_url: String },

    #[error("gave up waiting for build {build_id} after {}s", .waited.as_secs())]
    ClientTimeout { build_id: String, waited: Duration },
}
