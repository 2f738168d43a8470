//! Transport abstraction for opening a streamed turn

use async_trait::async_trait;
use ochat_ai::{FragmentStream, Result, StreamClient};
use tokio_util::sync::CancellationToken;

/// Opens the response stream for one prompt
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `prompt` and return the decoded response stream.
    ///
    /// Implementations must observe `cancel` both while connecting and while
    /// the stream is read.
    async fn open(&self, prompt: &str, cancel: CancellationToken) -> Result<FragmentStream>;
}

/// Transport backed by the HTTP proxy client
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: StreamClient,
}

impl HttpTransport {
    pub fn new(client: StreamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, prompt: &str, cancel: CancellationToken) -> Result<FragmentStream> {
        self.client.stream(prompt, cancel).await
    }
}
