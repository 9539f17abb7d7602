// HTTP transport module: a tiny request/reply model and the blocking
// reqwest client that executes it. Everything that talks to the network
// goes through the `Transport` trait so the fetchers and the disk client
// can be exercised against a mock in tests.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// A single outgoing request. Built with the `get`/`head`/`put`/`post`
/// constructors and refined with `authorization` and `timeout`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub authorization: Option<String>,
    pub timeout: Option<Duration>,
}

impl Request {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Request {
            method,
            url: url.into(),
            authorization: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Full value of the `Authorization` header, scheme included.
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// Overrides the client-wide timeout for this request only.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What came back from the server. The body is kept as text so callers can
/// decide whether (and into what) to parse it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .with_context(|| format!("Parsing response body (status {})", self.status))
    }
}

/// Executes requests. Implementations must not treat non-2xx statuses as
/// errors; only failures to get any reply at all are `Err`.
#[cfg_attr(test, automock)]
pub trait Transport {
    fn send(&self, request: Request) -> Result<Reply>;
}

/// Blocking reqwest-backed transport with a default timeout for every call.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpClient { client })
    }
}

impl Transport for HttpClient {
    fn send(&self, request: Request) -> Result<Reply> {
        log::debug!("{} {}", request.method, request.url);
        let mut builder = self.client.request(request.method.clone(), &request.url);
        if let Some(auth) = &request.authorization {
            builder = builder.header(AUTHORIZATION, auth.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let res = builder
            .send()
            .with_context(|| format!("Failed to send {} request to {}", request.method, request.url))?;
        let status = res.status().as_u16();
        // Read the header directly: for HEAD replies the body is empty and
        // the body-derived length would always be zero.
        let content_length = res
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = res
            .text()
            .with_context(|| format!("Failed to read {} response body from {}", request.method, request.url))?;
        log::debug!("{} {} -> {}", request.method, request.url, status);

        Ok(Reply {
            status,
            content_length,
            body,
        })
    }
}
