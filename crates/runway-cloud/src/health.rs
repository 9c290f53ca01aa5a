use std::time::Duration;

use runway_core::HEALTH_CHECK_PATH;

/// HTTP client for the deployed service's health endpoint.
pub struct HealthProbe {
    http_client: reqwest::Client,
}

/// What `/health` answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl HealthProbe {
    pub fn new(timeout: Duration) -> Result<Self, HealthError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("runway/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| HealthError::Client { source: e })?;

        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// GET `<endpoint>/health`. Non-2xx answers are reported, not errors.
    pub async fn probe(&self, endpoint: &str) -> Result<HealthReport, HealthError> {
        let url = health_url(endpoint);
        tracing::debug!(%url, "probing health endpoint");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| HealthError::Request {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| HealthError::Request {
            url: url.clone(),
            source: e,
        })?;

        Ok(HealthReport { url, status, body })
    }
}

/// Stack outputs may or may not carry a scheme or trailing slash.
pub fn health_url(endpoint: &str) -> String {
    let base = endpoint.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{HEALTH_CHECK_PATH}")
    } else {
        format!("https://{base}{HEALTH_CHECK_PATH}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("failed to build HTTP client")]
    Client { source: reqwest::Error },

    #[error("health check request to {url} failed")]
    Request { url: String, source: reqwest::Error },
}
