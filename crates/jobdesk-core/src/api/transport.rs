//! Outbound request description and the HTTP transport that executes it.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use super::error::TransportError;

/// A fully described HTTP call that can be replayed verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn put(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace any Authorization header with `Bearer <token>`.
    ///
    /// Tokens that cannot be encoded as a header value leave the request
    /// without an Authorization header.
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.headers.remove(header::AUTHORIZATION);
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(header::AUTHORIZATION, value);
            }
            Err(_) => debug!(url = %self.url, "Access token is not a valid header value"),
        }
        self
    }

    pub fn without_authorization(mut self) -> Self {
        self.headers.remove(header::AUTHORIZATION);
        self
    }

    /// Token carried in the Authorization header, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

impl fmt::Display for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Join a base URL and an API path. Absolute URLs are returned unchanged.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Executes outbound requests.
///
/// A successful (2xx) response yields its body text; every other outcome
/// is a `TransportError` carrying the request for retry.
pub trait Transport: Send + Sync {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<String, TransportError>>;
}

/// `Transport` backed by a pooled reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn execute(&self, request: OutboundRequest) -> Result<String, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone())
            .header(header::ACCEPT, "application/json");
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, url = %request.url, "Sending request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(source) => return Err(TransportError::Network { source, request }),
        };

        let status = response.status();
        if status.is_success() {
            response
                .text()
                .await
                .map_err(|source| TransportError::Network { source, request })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(TransportError::from_status(status.as_u16(), &body, request))
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: OutboundRequest) -> BoxFuture<'_, Result<String, TransportError>> {
        Box::pin(self.execute(request))
    }
}
