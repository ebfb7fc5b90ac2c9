//! Analysis endpoint HTTP client

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{AnalyzeError, Result};
use crate::form::FormSubmission;
use crate::types::{AnalysisResult, ImageLink};

/// HTTP client for the crop-health analysis endpoint
#[derive(Debug, Clone)]
pub struct AnalyzeClient {
    client: Client,
    base_url: Url,
    analyze_url: Url,
    config: ClientConfig,
}

impl AnalyzeClient {
    /// Create a new client with default settings
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the analysis server (e.g., "http://localhost:5000")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(ClientConfig::new(base_url))
    }

    /// Create a new client from a full configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeouts.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.timeouts.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;

        let base_url = Url::parse(&config.connection.base_url)?;
        let analyze_url = base_url.join(&config.endpoints.analyze)?;

        Ok(Self {
            client,
            base_url,
            analyze_url,
            config,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get the resolved form submission URL
    pub fn endpoint_url(&self) -> &Url {
        &self.analyze_url
    }

    /// Get the configuration this client was built from
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Submit form fields as multipart data and decode the analysis result
    ///
    /// The status code is not consulted: the body either decodes as an
    /// [`AnalysisResult`] or the call fails with [`AnalyzeError::ParseError`].
    #[instrument(skip(self, form), fields(fields = form.len()))]
    pub async fn analyze(&self, form: &FormSubmission) -> Result<AnalysisResult> {
        let url = self.analyze_url.clone();
        debug!("Submitting form to {}", url);

        let response = self
            .client
            .post(url)
            .multipart(form.to_multipart()?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!("Analyze endpoint answered with HTTP {}", status);
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| AnalyzeError::ParseError(format!("{} (HTTP {})", e, status)))
    }

    // =========================================================================
    // Result Images
    // =========================================================================

    /// Resolve an image URL against the server base URL
    pub fn image_url(&self, link: &ImageLink) -> Result<Url> {
        Ok(self.base_url.join(&link.url)?)
    }

    /// Download a result image
    #[instrument(skip(self), fields(name = %link.name))]
    pub async fn fetch_image(&self, link: &ImageLink) -> Result<Bytes> {
        let url = self.image_url(link)?;
        debug!("Fetching image from {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.bytes().await?)
        } else {
            Err(self.extract_error(response, status).await)
        }
    }

    async fn extract_error(&self, response: reqwest::Response, status: StatusCode) -> AnalyzeError {
        let message = match response.text().await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => format!("HTTP {}", status),
        };
        AnalyzeError::server_error(status.as_u16(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = AnalyzeClient::new("http://localhost:5000");
        assert!(client.is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let client = AnalyzeClient::new("not a url");
        assert!(matches!(client, Err(AnalyzeError::InvalidUrl(_))));
    }

    #[test]
    fn test_endpoint_url() {
        let client = AnalyzeClient::new("http://localhost:5000").unwrap();
        assert_eq!(client.endpoint_url().as_str(), "http://localhost:5000/analyze");

        let config = ClientConfig::builder("http://localhost:5000/app/")
            .analyze_path("api/analyze")
            .build();
        let client = AnalyzeClient::with_config(config).unwrap();
        assert_eq!(
            client.endpoint_url().as_str(),
            "http://localhost:5000/app/api/analyze"
        );
    }

    #[test]
    fn test_image_url_resolution() {
        let client = AnalyzeClient::new("http://localhost:5000").unwrap();

        let relative = ImageLink::new("NDVI", "/static/out/ndvi.png");
        assert_eq!(
            client.image_url(&relative).unwrap().as_str(),
            "http://localhost:5000/static/out/ndvi.png"
        );

        let absolute = ImageLink::new("RECI", "https://cdn.example.org/reci.png");
        assert_eq!(
            client.image_url(&absolute).unwrap().as_str(),
            "https://cdn.example.org/reci.png"
        );
    }
}
