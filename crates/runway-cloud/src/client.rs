use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::command::{CommandError, Tool};
use crate::executor::{CommandExecutor, RealExecutor};

/// Attempts made by [`AwsClient::probe_stack`] before giving up on transient errors.
const PROBE_ATTEMPTS: u32 = 3;
const PROBE_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// stderr fragments of errors worth retrying.
const TRANSIENT_MARKERS: &[&str] = &[
    "Throttling",
    "Rate exceeded",
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "Could not connect to the endpoint URL",
    "Connection was closed",
    "Read timeout",
];

/// AWS operations client, parameterized over the executor for testability.
pub struct AwsClient<E: CommandExecutor = RealExecutor> {
    pub(crate) executor: E,
    region: String,
}

impl AwsClient<RealExecutor> {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            executor: RealExecutor,
            region: region.into(),
        }
    }
}

impl<E: CommandExecutor> AwsClient<E> {
    pub fn with_executor(executor: E, region: impl Into<String>) -> Self {
        Self {
            executor,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Run an `aws` command pinned to the client's region.
    pub(crate) async fn aws(&self, mut args: Vec<String>) -> Result<String, CommandError> {
        args.extend(["--region".to_owned(), self.region.clone()]);
        self.executor.exec(Tool::Aws, &args).await
    }

    pub(crate) async fn aws_streaming(&self, mut args: Vec<String>) -> Result<(), CommandError> {
        args.extend(["--region".to_owned(), self.region.clone()]);
        self.executor.exec_streaming(Tool::Aws, &args).await
    }

    // ── Preflight ──

    /// Verify the operator's AWS credentials resolve to an identity.
    pub async fn check_identity(&self) -> Result<CallerIdentity, PreflightError> {
        let output = self
            .aws(args(["sts", "get-caller-identity", "--output", "json"]))
            .await
            .map_err(|e| match e {
                CommandError::NotFound { .. } => PreflightError::AwsCliNotInstalled { source: e },
                _ => PreflightError::NotAuthenticated { source: e },
            })?;

        serde_json::from_str(&output).map_err(|e| PreflightError::InvalidIdentity { source: e })
    }

    /// Verify a Docker daemon answers; returns its server version.
    pub async fn check_build_daemon(&self) -> Result<String, PreflightError> {
        let version = self
            .executor
            .exec(
                Tool::Docker,
                &args(["info", "--format", "{{.ServerVersion}}"]),
            )
            .await
            .map_err(|e| match e {
                CommandError::NotFound { .. } => PreflightError::DockerNotInstalled { source: e },
                _ => PreflightError::DaemonUnreachable { source: e },
            })?;

        Ok(version.trim().to_owned())
    }

    // ── Doctor ──

    /// Run all diagnostic checks without early return.
    /// Returns a report with pass/fail for each check item.
    pub async fn doctor(&self) -> DoctorReport {
        let mut report = DoctorReport::default();

        // 1. aws CLI
        match self.executor.exec(Tool::Aws, &args(["--version"])).await {
            Ok(v) => {
                // "aws-cli/2.15.0 Python/3.11.6 Linux/6.1 exe/x86_64"
                let version = v
                    .split_whitespace()
                    .next()
                    .and_then(|token| token.strip_prefix("aws-cli/"))
                    .unwrap_or(v.trim());
                report.aws_cli = CheckResult::ok(version);
            }
            Err(e) => report.aws_cli = CheckResult::fail(&e.to_string()),
        }

        // 2. Identity
        match self.check_identity().await {
            Ok(identity) => {
                report.identity =
                    CheckResult::ok(&format!("{} ({})", identity.arn, identity.account));
            }
            Err(e) => report.identity = CheckResult::fail(&e.to_string()),
        }

        // 3. Docker (only needed for local builds)
        match self.check_build_daemon().await {
            Ok(version) => report.docker = CheckResult::ok(&format!("server {version}")),
            Err(e) => report.docker = CheckResult::fail(&e.to_string()),
        }

        // 4. Region
        report.region = CheckResult::ok(&self.region);

        report
    }

    // ── CloudFormation ──

    /// Classify whether the stack exists.
    ///
    /// Transient transport errors are retried with exponential backoff; any
    /// error that is neither "does not exist" nor recoverable yields
    /// [`StackPresence::Indeterminate`], which callers treat as present.
    pub async fn probe_stack(&self, stack: &str) -> StackPresence {
        let mut attempt = 1;
        let mut delay = PROBE_BACKOFF_BASE;

        loop {
            let result = self
                .aws(args([
                    "cloudformation",
                    "describe-stacks",
                    "--stack-name",
                    stack,
                    "--query",
                    "Stacks[0].StackStatus",
                    "--output",
                    "text",
                ]))
                .await;

            match result {
                Ok(output) => {
                    return match non_sentinel(&output) {
                        Some(status) => StackPresence::Present { status },
                        None => StackPresence::Absent,
                    };
                }
                Err(e) if e.stderr_contains("does not exist") => return StackPresence::Absent,
                Err(e) if is_transient(&e) && attempt < PROBE_ATTEMPTS => {
                    tracing::warn!(%stack, attempt, error = %e, "transient error probing stack, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::warn!(%stack, error = %e, "stack probe inconclusive, assuming it exists");
                    return StackPresence::Indeterminate {
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    /// Read one stack output; `None` when the output is absent.
    pub async fn stack_output(&self, stack: &str, key: &str) -> Result<Option<String>, StackError> {
        let query = format!("Stacks[0].Outputs[?OutputKey=='{key}'].OutputValue | [0]");
        let output = self
            .aws(args([
                "cloudformation",
                "describe-stacks",
                "--stack-name",
                stack,
                "--query",
                &query,
                "--output",
                "text",
            ]))
            .await
            .map_err(|e| StackError::Describe {
                stack: stack.to_owned(),
                source: e,
            })?;

        Ok(non_sentinel(&output))
    }

    /// Converge the stack to the given template and parameters.
    pub async fn deploy_stack(
        &self,
        stack: &str,
        template_path: &Path,
        parameter_overrides: &[String],
    ) -> Result<(), StackError> {
        let template = template_path
            .to_str()
            .ok_or_else(|| StackError::InvalidPath(template_path.to_path_buf()))?;

        let mut cmd = args([
            "cloudformation",
            "deploy",
            "--stack-name",
            stack,
            "--template-file",
            template,
            "--capabilities",
            "CAPABILITY_IAM",
            "--no-fail-on-empty-changeset",
            "--parameter-overrides",
        ]);
        cmd.extend(parameter_overrides.iter().cloned());

        self.aws_streaming(cmd)
            .await
            .map_err(|e| StackError::Deploy {
                stack: stack.to_owned(),
                source: e,
            })
    }

    /// Delete the stack and block until deletion finishes.
    pub async fn delete_stack(&self, stack: &str) -> Result<(), StackError> {
        self.aws(args(["cloudformation", "delete-stack", "--stack-name", stack]))
            .await
            .map_err(|e| StackError::Delete {
                stack: stack.to_owned(),
                source: e,
            })?;

        self.aws_streaming(args([
            "cloudformation",
            "wait",
            "stack-delete-complete",
            "--stack-name",
            stack,
        ]))
        .await
        .map_err(|e| StackError::Delete {
            stack: stack.to_owned(),
            source: e,
        })
    }
}

// ── Helper ──

pub(crate) fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

/// `aws --output text` prints `None` for null query results.
pub(crate) fn non_sentinel(output: &str) -> Option<String> {
    let value = output.trim();
    if value.is_empty() || value == "None" {
        None
    } else {
        Some(value.to_owned())
    }
}

fn is_transient(error: &CommandError) -> bool {
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| error.stderr_contains(marker))
}

// ── Types ──

/// Output of `aws sts get-caller-identity`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: String,
}

/// Whether a stack exists, as far as the control plane lets us tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackPresence {
    Absent,
    Present { status: String },
    Indeterminate { reason: String },
}

impl StackPresence {
    /// Only an explicit "does not exist" triggers the bootstrap deploy.
    pub fn needs_bootstrap(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for StackPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("not found"),
            Self::Present { status } => f.write_str(status),
            Self::Indeterminate { reason } => write!(f, "unknown ({reason})"),
        }
    }
}

// ── Error types ──

#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error("aws CLI not installed — https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html")]
    AwsCliNotInstalled { source: CommandError },

    #[error("AWS credentials not configured — run: aws configure (or aws sso login)")]
    NotAuthenticated { source: CommandError },

    #[error("unexpected output from aws sts get-caller-identity")]
    InvalidIdentity { source: serde_json::Error },

    #[error("docker CLI not installed — https://docs.docker.com/get-docker/")]
    DockerNotInstalled { source: CommandError },

    #[error("Docker daemon is not reachable — start Docker and retry")]
    DaemonUnreachable { source: CommandError },
}

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("template path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),

    #[error("failed to describe stack {stack}")]
    Describe { stack: String, source: CommandError },

    #[error("failed to deploy stack {stack}")]
    Deploy { stack: String, source: CommandError },

    #[error("failed to delete stack {stack}")]
    Delete { stack: String, source: CommandError },
}

// ── Doctor types ──

#[derive(Debug, Default)]
pub struct DoctorReport {
    pub aws_cli: CheckResult,
    pub identity: CheckResult,
    pub docker: CheckResult,
    pub region: CheckResult,
    pub config_file: CheckResult,
}

impl DoctorReport {
    /// Docker is optional: remote builds do not need it.
    pub fn all_passed(&self) -> bool {
        self.aws_cli.passed && self.identity.passed && self.region.passed && self.config_file.passed
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("aws CLI", &self.aws_cli),
            ("Identity", &self.identity),
            ("Docker", &self.docker),
            ("Region", &self.region),
            ("runway.toml", &self.config_file),
        ];
        for (label, check) in rows {
            writeln!(f, "  [{}] {label:<12} {}", check.icon(), check.detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    pub fn ok(detail: &str) -> Self {
        Self {
            passed: true,
            detail: detail.to_owned(),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            passed: false,
            detail: detail.to_owned(),
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.passed { "OK" } else { "NG" }
    }
}
