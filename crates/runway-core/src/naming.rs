use crate::environment::{Environment, check_name_chars};

/// App Runner service names are capped at 40 characters; the stack and the
/// repository share the same base name, so this bounds all three.
pub const MAX_SERVICE_NAME_LEN: usize = 40;

/// Names of everything provisioned for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    /// CloudFormation stack, also the ECR repository and App Runner service name.
    pub stack: String,
    /// CodeBuild project shared by every environment of the project.
    pub codebuild_project: String,
    /// IAM role CodeBuild assumes.
    pub codebuild_role: String,
}

impl ResourceNames {
    pub fn new(prefix: &str, env: &Environment) -> crate::Result<Self> {
        check_name_chars(prefix).map_err(|reason| crate::Error::InvalidProjectName {
            name: prefix.to_owned(),
            reason,
        })?;
        env.validate()?;

        let stack = format!("{prefix}-{env}");
        if stack.len() > MAX_SERVICE_NAME_LEN {
            return Err(crate::Error::NameTooLong {
                len: stack.len(),
                name: stack,
                max: MAX_SERVICE_NAME_LEN,
            });
        }

        Ok(Self {
            stack,
            codebuild_project: format!("{prefix}-image-build"),
            codebuild_role: format!("{prefix}-codebuild-role"),
        })
    }

    pub fn repository(&self) -> &str {
        &self.stack
    }

    pub fn service(&self) -> &str {
        &self.stack
    }

    /// S3 bucket holding build inputs, one per account and region.
    pub fn artifact_bucket(account: &str, region: &str) -> String {
        format!("runway-artifacts-{account}-{region}")
    }

    /// Object key for a build input of this environment.
    pub fn artifact_key(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.stack)
    }
}
