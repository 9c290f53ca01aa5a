//! AWS operations for runway, driven through the `aws` and `docker` CLIs.
//!
//! Every external call goes through [`CommandExecutor`] so the workflow can
//! be exercised against mocks.

pub mod client;
pub mod codebuild;
pub mod command;
pub mod executor;
pub mod health;
pub mod lock;
pub mod registry;
pub mod workflow;

pub use client::{AwsClient, CheckResult, DoctorReport, StackPresence};
pub use codebuild::{BuildStatus, PollPolicy};
pub use command::{CommandError, Tool};
pub use executor::{CommandExecutor, RealExecutor};
pub use health::{HealthProbe, HealthReport};
pub use lock::{DeployLease, LockInfo};
pub use workflow::{DeployOutcome, DeployRequest, WorkflowError, deploy};
