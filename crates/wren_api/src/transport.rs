use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt, TryStreamExt};
use reqwest::Client;
use url::Url;

use crate::config::WrenApiConfig;
use crate::error::{parse_error_message, TransportError, WrenApiError};
use crate::headers::to_header_map;
use crate::retry::is_retryable_http_error;

/// Raw body chunks of an open stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Everything needed to (re)open one server-push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub url: Url,
    pub headers: BTreeMap<String, String>,
}

impl StreamTarget {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Value of a query parameter on the target URL.
    pub fn query_param(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }
}

/// Seam between stream connections and the network.
///
/// `open` resolves once the handshake has succeeded; the returned stream
/// yields body chunks until the server closes it or the transport fails.
pub trait EventTransport: Send + Sync + 'static {
    fn open(&self, target: &StreamTarget) -> BoxFuture<'static, Result<ByteStream, TransportError>>;
}

impl<T> EventTransport for Arc<T>
where
    T: EventTransport + ?Sized,
{
    fn open(&self, target: &StreamTarget) -> BoxFuture<'static, Result<ByteStream, TransportError>> {
        (**self).open(target)
    }
}

/// [`EventTransport`] over HTTP `GET` with a streaming body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Streams are long-lived, so only the connect timeout applies here.
    pub fn new(config: &WrenApiConfig) -> Result<Self, WrenApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(WrenApiError::from)?;
        Ok(Self { http })
    }

    pub fn from_client(http: Client) -> Self {
        Self { http }
    }
}

impl EventTransport for HttpTransport {
    fn open(&self, target: &StreamTarget) -> BoxFuture<'static, Result<ByteStream, TransportError>> {
        let http = self.http.clone();
        let target = target.clone();

        async move {
            let headers = to_header_map(&target.headers)
                .map_err(|error| TransportError::InvalidTarget(error.to_string()))?;
            let response = http
                .get(target.url.clone())
                .headers(headers)
                .send()
                .await
                .map_err(|error| TransportError::Connect(error.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    retryable: is_retryable_http_error(status.as_u16(), &body),
                    message: parse_error_message(status, &body),
                });
            }

            Ok(response
                .bytes_stream()
                .map_err(|error| TransportError::Body(error.to_string()))
                .boxed())
        }
        .boxed()
    }
}
