//! HTTP client for the generation proxy

use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    stream::{FragmentStream, fragment_stream},
    types::{CompletionRequest, CompletionResponse, GenerateRequest},
};

/// Proxy address used when nothing else is configured
pub const DEFAULT_ENDPOINT: &str = "http://10.100.201.91:8000";

/// Client for the `/stream`, `/generate` and `/healthz` routes
#[derive(Debug, Clone)]
pub struct StreamClient {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for StreamClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl StreamClient {
    /// Create a client for the given base URL
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Validate an endpoint string before building a client from it
    pub fn parse_endpoint(endpoint: &str) -> Result<Self> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| Error::InvalidConfig(format!("bad endpoint '{}': {}", endpoint, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "endpoint must be http(s), got '{}'",
                url.scheme()
            )));
        }
        Ok(Self::new(endpoint))
    }

    /// Base URL without a trailing slash
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start a streaming generation for `prompt`.
    ///
    /// Returns once response headers arrive. A non-success status becomes
    /// [`Error::Server`] with the body text; cancellation before the stream
    /// is returned, including while an error body is read, becomes
    /// [`Error::Aborted`].
    pub async fn stream(&self, prompt: &str, cancel: CancellationToken) -> Result<FragmentStream> {
        let url = format!("{}/stream", self.endpoint);
        let request = GenerateRequest::new(prompt);

        tracing::debug!("POST {} ({} prompt chars)", url, prompt.chars().count());

        let send = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .json(&request)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Aborted),
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            // Reading the error body stays cancellable
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Aborted),
                body = response.text() => body.unwrap_or_default(),
            };
            return Err(Error::server(status.as_u16(), body));
        }

        Ok(Box::pin(fragment_stream(response.bytes_stream(), cancel)))
    }

    /// Generate a complete response in one round trip
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/generate", self.endpoint);

        let response = self
            .client
            .post(&url)
            .json(&CompletionRequest::new(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::server(status.as_u16(), body));
        }

        let completion: CompletionResponse = response.json().await?;
        Ok(completion.response)
    }

    /// Probe the proxy's health route
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/healthz", self.endpoint);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::server(status.as_u16(), body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = StreamClient::new("http://localhost:8000/");
        assert_eq!(client.endpoint(), "http://localhost:8000");
    }

    #[test]
    fn test_parse_endpoint_rejects_garbage() {
        assert!(matches!(
            StreamClient::parse_endpoint("not a url"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            StreamClient::parse_endpoint("ftp://host"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(StreamClient::parse_endpoint("https://proxy.local:8443").is_ok());
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(StreamClient::default().endpoint(), DEFAULT_ENDPOINT);
    }
}
