use std::fmt;

/// A registry repository URI such as
/// `123456789012.dkr.ecr.us-east-1.amazonaws.com/app-dev`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    repository_uri: String,
}

impl ImageRef {
    pub fn parse(uri: &str) -> crate::Result<Self> {
        let uri = uri.trim();
        match uri.split_once('/') {
            Some((host, name)) if !host.is_empty() && !name.is_empty() => Ok(Self {
                repository_uri: uri.to_owned(),
            }),
            _ => Err(crate::Error::InvalidRepositoryUri(uri.to_owned())),
        }
    }

    pub fn repository_uri(&self) -> &str {
        &self.repository_uri
    }

    /// Host part used for `docker login`.
    pub fn registry_host(&self) -> &str {
        self.repository_uri
            .split_once('/')
            .map_or(self.repository_uri.as_str(), |(host, _)| host)
    }

    /// Repository path after the host.
    pub fn repository_name(&self) -> &str {
        self.repository_uri
            .split_once('/')
            .map_or(self.repository_uri.as_str(), |(_, name)| name)
    }

    /// Fully qualified reference, `<uri>:<tag>`.
    pub fn tagged(&self, tag: &str) -> String {
        format!("{}:{tag}", self.repository_uri)
    }

    /// Name of the image as built before tagging for the registry.
    pub fn local_tag(&self, tag: &str) -> String {
        format!("{}:{tag}", self.repository_name())
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repository_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "123456789012.dkr.ecr.us-east-1.amazonaws.com/app-dev";

    #[test]
    fn splits_host_and_name() {
        let image = ImageRef::parse(URI).unwrap();
        assert_eq!(image.registry_host(), "123456789012.dkr.ecr.us-east-1.amazonaws.com");
        assert_eq!(image.repository_name(), "app-dev");
        assert_eq!(image.tagged("latest"), format!("{URI}:latest"));
        assert_eq!(image.local_tag("latest"), "app-dev:latest");
    }

    #[test]
    fn trims_cli_output() {
        let image = ImageRef::parse(&format!("{URI}\n")).unwrap();
        assert_eq!(image.repository_uri(), URI);
    }

    #[test]
    fn rejects_uri_without_repository() {
        assert!(ImageRef::parse("registry.example.com").is_err());
        assert!(ImageRef::parse("registry.example.com/").is_err());
        assert!(ImageRef::parse("").is_err());
    }
}
