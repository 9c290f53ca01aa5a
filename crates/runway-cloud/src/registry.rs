use runway_core::{BuildConfig, IMAGE_TAG, ImageRef};
use secrecy::{ExposeSecret, SecretString};

use crate::client::{AwsClient, args};
use crate::command::{CommandError, Tool};
use crate::executor::CommandExecutor;

impl<E: CommandExecutor> AwsClient<E> {
    // ── Local image publish ──

    /// Build, authenticate, tag, and push `<repository>:latest` from this machine.
    /// Returns the pushed reference.
    pub async fn publish_local(
        &self,
        build: &BuildConfig,
        image: &ImageRef,
    ) -> Result<String, PublishError> {
        let local_tag = image.local_tag(IMAGE_TAG);
        let remote = image.tagged(IMAGE_TAG);

        tracing::info!(%local_tag, "building image locally");
        self.docker_build(build, &local_tag).await?;

        let password = self.ecr_login_password().await?;
        self.docker_login(image, &password).await?;

        self.docker_tag(&local_tag, &remote).await?;

        tracing::info!(%remote, "pushing image");
        self.docker_push(&remote).await?;

        Ok(remote)
    }

    pub async fn docker_build(&self, build: &BuildConfig, tag: &str) -> Result<(), PublishError> {
        self.executor
            .exec_streaming(
                Tool::Docker,
                &args([
                    "build",
                    "--platform",
                    &build.platform,
                    "-f",
                    &build.dockerfile,
                    "-t",
                    tag,
                    &build.context,
                ]),
            )
            .await
            .map_err(|e| PublishError::Build { source: e })
    }

    /// Short-lived registry password; never logged.
    pub async fn ecr_login_password(&self) -> Result<SecretString, PublishError> {
        let password = self
            .aws(args(["ecr", "get-login-password"]))
            .await
            .map_err(|e| PublishError::RegistryAuth { source: e })?;

        Ok(SecretString::from(password.trim().to_owned()))
    }

    pub async fn docker_login(
        &self,
        image: &ImageRef,
        password: &SecretString,
    ) -> Result<(), PublishError> {
        self.executor
            .exec_with_stdin(
                Tool::Docker,
                &args([
                    "login",
                    "--username",
                    "AWS",
                    "--password-stdin",
                    image.registry_host(),
                ]),
                password.expose_secret().as_bytes(),
            )
            .await
            .map_err(|e| PublishError::RegistryAuth { source: e })?;

        Ok(())
    }

    pub async fn docker_tag(&self, source: &str, target: &str) -> Result<(), PublishError> {
        self.executor
            .exec(Tool::Docker, &args(["tag", source, target]))
            .await
            .map_err(|e| PublishError::Tag { source: e })?;

        Ok(())
    }

    pub async fn docker_push(&self, reference: &str) -> Result<(), PublishError> {
        self.executor
            .exec_streaming(Tool::Docker, &args(["push", reference]))
            .await
            .map_err(|e| PublishError::Push { source: e })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("docker build failed")]
    Build { source: CommandError },

    #[error("registry authentication failed")]
    RegistryAuth { source: CommandError },

    #[error("docker tag failed")]
    Tag { source: CommandError },

    #[error("docker push failed")]
    Push { source: CommandError },
}
