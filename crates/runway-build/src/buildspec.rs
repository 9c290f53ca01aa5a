use runway_core::{BuildConfig, IMAGE_TAG, ImageRef};
use serde::Serialize;

/// Object name of the buildspec next to the source archive.
pub const BUILDSPEC_NAME: &str = "buildspec.yml";

/// Artifact written by the post-build phase.
pub const IMAGE_DETAIL_FILE: &str = "imageDetail.json";

/// Generates the CodeBuild buildspec that builds, tags, and pushes the image.
pub struct BuildSpecGenerator<'a> {
    config: &'a BuildConfig,
    image: &'a ImageRef,
    region: &'a str,
}

#[derive(Serialize)]
struct BuildSpec {
    version: f64,
    phases: Phases,
    artifacts: Artifacts,
}

#[derive(Serialize)]
struct Phases {
    pre_build: Phase,
    build: Phase,
    post_build: Phase,
}

#[derive(Serialize)]
struct Phase {
    commands: Vec<String>,
}

#[derive(Serialize)]
struct Artifacts {
    files: Vec<String>,
}

#[derive(Serialize)]
struct ImageDetail<'a> {
    #[serde(rename = "ImageURI")]
    image_uri: &'a str,
}

impl<'a> BuildSpecGenerator<'a> {
    pub fn new(config: &'a BuildConfig, image: &'a ImageRef, region: &'a str) -> Self {
        Self {
            config,
            image,
            region,
        }
    }

    pub fn render(&self) -> Result<String, BuildSpecError> {
        let local = self.image.local_tag(IMAGE_TAG);
        let remote = self.image.tagged(IMAGE_TAG);
        let detail = serde_json::to_string(&ImageDetail { image_uri: &remote })
            .map_err(|e| BuildSpecError::ImageDetail { source: e })?;

        let spec = BuildSpec {
            version: 0.2,
            phases: Phases {
                pre_build: Phase {
                    commands: vec![
                        "echo Logging in to Amazon ECR".to_owned(),
                        format!(
                            "aws ecr get-login-password --region {region} | docker login --username AWS --password-stdin {host}",
                            region = self.region,
                            host = self.image.registry_host(),
                        ),
                    ],
                },
                build: Phase {
                    commands: vec![
                        format!(
                            "docker build --platform {platform} -f {dockerfile} -t {local} {context}",
                            platform = self.config.platform,
                            dockerfile = self.config.dockerfile,
                            context = self.config.context,
                        ),
                        format!("docker tag {local} {remote}"),
                    ],
                },
                post_build: Phase {
                    commands: vec![
                        format!("docker push {remote}"),
                        format!("printf '%s' '{detail}' > {IMAGE_DETAIL_FILE}"),
                    ],
                },
            },
            artifacts: Artifacts {
                files: vec![IMAGE_DETAIL_FILE.to_owned()],
            },
        };

        serde_yaml::to_string(&spec).map_err(|e| BuildSpecError::Serialize { source: e })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildSpecError {
    #[error("failed to encode image descriptor")]
    ImageDetail { source: serde_json::Error },
    #[error("failed to serialize buildspec")]
    Serialize { source: serde_yaml::Error },
}
