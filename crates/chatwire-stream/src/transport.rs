//! Byte-stream transport port and its HTTP implementation.

use crate::config::SubscriptionConfig;
use crate::error::StreamError;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::ACCEPT;
use tracing::{debug, instrument};

/// Ordered raw body chunks of one subscription response.
pub type ByteStream = BoxStream<'static, Result<Bytes, StreamError>>;

/// Opens the byte stream for a subscription.
///
/// Returning `Ok` means the response was confirmed successful; the controller
/// moves to streaming from there.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, config: &SubscriptionConfig) -> Result<ByteStream, StreamError>;
}

/// `GET /v1/chats/subscribe` over reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client honouring the config's connect timeout.
    pub fn from_config(config: &SubscriptionConfig) -> Result<Self, StreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().map_err(StreamError::Request)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip_all, fields(chat_id = %config.chat_id))]
    async fn open(&self, config: &SubscriptionConfig) -> Result<ByteStream, StreamError> {
        let url = config.subscribe_url()?;
        let mut request = self.client.get(url).header(ACCEPT, "text/event-stream");
        if let Some(key) = &config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(StreamError::Request)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(%status, "subscription response accepted");

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| StreamError::Read(std::io::Error::other(err))))
            .boxed())
    }
}
