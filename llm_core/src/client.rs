use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{StatusCode, Url};
use tracing::{debug, info};

use crate::{error::StreamError, request::ChatRequest};

/// Raw response body, chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Something that answers a question with a streamed body.
#[async_trait]
pub trait AnswerSource: Send + Sync {
    /// Send the request and return the body once the response head is in.
    async fn open(&self, request: ChatRequest) -> Result<ByteStream, StreamError>;
}

/// HTTP client for the streaming answer endpoint.
///
/// The endpoint takes a multipart POST and answers with raw text chunks;
/// there is no framing, the concatenated body is the answer.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    url: Url,
}

impl BackendClient {
    pub fn new(url: &str) -> Result<Self, StreamError> {
        let url = Url::parse(url).map_err(|e| StreamError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StreamError::InvalidUrl(format!("unsupported scheme in {url}")));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }
}

#[async_trait]
impl AnswerSource for BackendClient {
    async fn open(&self, request: ChatRequest) -> Result<ByteStream, StreamError> {
        let has_file = request.file.is_some();
        let form = request.into_form()?;
        debug!("POST {} (file attached: {})", self.url, has_file);

        let response = self.client.post(self.url.clone()).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(StreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Err(StreamError::MissingBody);
        }

        info!("Backend answered {}, streaming body", status);
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::Body(e.to_string())));
        Ok(Box::pin(body))
    }
}
