use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// runway.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunwayConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Prefix for every provisioned resource (`<name>-<environment>`)
    #[serde(default = "default_project_name")]
    pub name: String,
    /// AWS region (overridden by `AWS_REGION`)
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Where the image gets built
    #[serde(default)]
    pub strategy: PublishStrategy,
    /// Docker build context, relative to the project directory
    #[serde(default = "default_context")]
    pub context: String,
    /// Dockerfile path, relative to the project directory
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
    /// Target platform passed to `docker build --platform`
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Extra paths left out of the remote build archive
    #[serde(default)]
    pub exclude: Vec<String>,
    /// CodeBuild environment image
    #[serde(default = "default_codebuild_image")]
    pub codebuild_image: String,
    /// CodeBuild compute type
    #[serde(default = "default_compute_type")]
    pub compute_type: String,
    /// Seconds between build status queries
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Give up waiting on the remote build after this many seconds
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// App Runner CPU units (e.g. "1024" or "1 vCPU")
    #[serde(default = "default_cpu")]
    pub cpu: String,
    /// App Runner memory (e.g. "2048" or "2 GB")
    #[serde(default = "default_memory")]
    pub memory: String,
    /// Port the application listens on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Redeploy automatically when a new image is pushed
    #[serde(default = "default_true")]
    pub auto_deployments: bool,
    /// Number of images the registry lifecycle policy keeps
    #[serde(default = "default_image_retention")]
    pub image_retention: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// DynamoDB table holding deploy leases; no lease is taken when unset
    pub table: Option<String>,
    /// Lease lifetime in seconds
    #[serde(default = "default_lock_ttl_secs")]
    pub ttl_secs: u64,
}

/// How the container image reaches the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStrategy {
    /// Build with the local Docker daemon and push directly.
    Local,
    /// Upload the source and let CodeBuild build and push.
    #[default]
    Remote,
}

impl fmt::Display for PublishStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for PublishStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown strategy '{other}' (expected local or remote)")),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            region: default_region(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            strategy: PublishStrategy::default(),
            context: default_context(),
            dockerfile: default_dockerfile(),
            platform: default_platform(),
            exclude: Vec::new(),
            codebuild_image: default_codebuild_image(),
            compute_type: default_compute_type(),
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu(),
            memory: default_memory(),
            port: default_port(),
            auto_deployments: true,
            image_retention: default_image_retention(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            table: None,
            ttl_secs: default_lock_ttl_secs(),
        }
    }
}

impl ProjectConfig {
    /// `AWS_REGION` wins over the configured region.
    pub fn resolve_region(&self, from_env: Option<&str>) -> String {
        match from_env.map(str::trim) {
            Some(region) if !region.is_empty() => region.to_owned(),
            _ => self.region.clone(),
        }
    }
}

impl RunwayConfig {
    /// Rejects values the deploy workflow cannot run with.
    ///
    /// The lease TTL only matters when a lock table is configured; it must
    /// outlive the longest remote build wait or the lease can lapse mid-deploy.
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |field, reason: &str| crate::Error::InvalidConfig {
            field,
            reason: reason.to_owned(),
        };

        if self.build.poll_interval_secs == 0 {
            return Err(invalid("build.poll_interval_secs", "must be at least 1"));
        }
        if self.build.max_wait_secs == 0 {
            return Err(invalid("build.max_wait_secs", "must be at least 1"));
        }
        if self.service.image_retention == 0 {
            return Err(invalid("service.image_retention", "must keep at least 1 image"));
        }
        if self.lock.table.is_some() && self.lock.ttl_secs <= self.build.max_wait_secs {
            return Err(crate::Error::InvalidConfig {
                field: "lock.ttl_secs",
                reason: format!(
                    "{}s does not outlive build.max_wait_secs ({}s)",
                    self.lock.ttl_secs, self.build.max_wait_secs
                ),
            });
        }
        Ok(())
    }

    /// Load from runway.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &std::path::Path) -> crate::Result<Self> {
        let config_path = project_dir.join("runway.toml");
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            let config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path.clone(),
                source: e,
            })?;
            config.validate()?;
            tracing::debug!(path = %config_path.display(), "loaded runway.toml");
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

fn default_project_name() -> String {
    "app".to_owned()
}

fn default_region() -> String {
    "us-east-1".to_owned()
}

fn default_context() -> String {
    ".".to_owned()
}

fn default_dockerfile() -> String {
    "Dockerfile".to_owned()
}

fn default_platform() -> String {
    "linux/amd64".to_owned()
}

fn default_codebuild_image() -> String {
    "aws/codebuild/standard:7.0".to_owned()
}

fn default_compute_type() -> String {
    "BUILD_GENERAL1_SMALL".to_owned()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_max_wait_secs() -> u64 {
    1800
}

fn default_cpu() -> String {
    "1024".to_owned()
}

fn default_memory() -> String {
    "2048".to_owned()
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

fn default_image_retention() -> u32 {
    10
}

fn default_lock_ttl_secs() -> u64 {
    3600
}
