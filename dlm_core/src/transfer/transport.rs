use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};

use crate::types::types::DownloadError;

pub type ChunkStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// What one transport request hands back to the worker.
pub struct TransportResponse {
    /// True iff the server answered a byte-range request with
    /// `206 Partial Content`, confirming the resume offset will be honoured.
    pub resumed: bool,
    /// Length of the response body, when the server reported one.
    pub content_length: Option<u64>,
    pub stream: ChunkStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("resumed", &self.resumed)
            .field("content_length", &self.content_length)
            .field("stream", &"<stream>")
            .finish()
    }
}

/// The "start transfer" capability the core consumes: one GET, optionally
/// ranged, yielding response metadata plus a stream of body chunks.
///
/// The manager accepts any implementation, so tests can script byte streams
/// with deterministic timing instead of standing up a real server.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn fetch(&self, url: &str, offset: u64) -> Result<TransportResponse, DownloadError>;
}

/// Production transport backed by a shared reqwest client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, offset: u64) -> Result<TransportResponse, DownloadError> {
        let mut builder = self.client.get(url);
        if offset > 0 {
            builder = builder.header(reqwest::header::RANGE, format!("bytes={}-", offset));
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Transport(format!(
                "unexpected HTTP status {} for {}",
                status, url
            )));
        }

        Ok(TransportResponse {
            resumed: status == StatusCode::PARTIAL_CONTENT,
            content_length: response.content_length(),
            stream: response
                .bytes_stream()
                .map_err(DownloadError::from)
                .boxed(),
        })
    }
}
