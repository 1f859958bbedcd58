//! HTTP transport for remote schema definitions
//!
//! [`SchemaFetcher`] is the only contract the remote resolver needs from an
//! HTTP library: GET a URI, return the body on 2xx. Two implementations are
//! provided so the host's concurrency model decides how a fetch waits:
//!
//! - [`AsyncHttpFetcher`] suspends the calling task
//! - [`BlockingHttpFetcher`] blocks a tokio blocking-pool thread
//!
//! Both report failures through the same [`FetchError`] variants.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use thiserror::Error;

use crate::config::HttpConfig;
use crate::error::{Result, SchemaError};

/// Media types accepted from a schema endpoint
const ACCEPT_SCHEMA: &str = "application/json, text/plain;q=0.9, */*;q=0.5";

/// Failure to fetch a schema definition
#[derive(Error, Debug)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP {status}")]
    Status { status: u16, body: String },

    /// Connection, timeout or body read failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Transport(_) => None,
        }
    }
}

/// Fetches raw schema definitions over HTTP
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> std::result::Result<String, FetchError>;
}

/// Non-blocking fetcher backed by [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct AsyncHttpFetcher {
    client: reqwest::Client,
}

impl AsyncHttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers(config)?)
            .build()
            .map_err(|e| {
                SchemaError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SchemaFetcher for AsyncHttpFetcher {
    async fn fetch(&self, uri: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}

/// Blocking fetcher backed by [`reqwest::blocking::Client`].
///
/// Requests run under [`tokio::task::spawn_blocking`]. The client is built
/// lazily on the first fetch, on a blocking-pool thread, since reqwest's
/// blocking client cannot be constructed from inside an async context.
#[derive(Debug, Clone)]
pub struct BlockingHttpFetcher {
    config: HttpConfig,
    client: Arc<Mutex<Option<reqwest::blocking::Client>>>,
}

impl BlockingHttpFetcher {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            config: config.clone(),
            client: Arc::new(Mutex::new(None)),
        }
    }

    fn client(&self) -> std::result::Result<reqwest::blocking::Client, FetchError> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let headers =
            default_headers(&self.config).map_err(|e| FetchError::Transport(e.to_string()))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Transport(format!("failed to build HTTP client: {}", e)))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    fn fetch_blocking(&self, uri: &str) -> std::result::Result<String, FetchError> {
        let response = self
            .client()?
            .get(uri)
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.text().map_err(|e| FetchError::Transport(e.to_string()))
    }
}

#[async_trait]
impl SchemaFetcher for BlockingHttpFetcher {
    async fn fetch(&self, uri: &str) -> std::result::Result<String, FetchError> {
        let fetcher = self.clone();
        let uri = uri.to_string();
        tokio::task::spawn_blocking(move || fetcher.fetch_blocking(&uri))
            .await
            .map_err(|e| FetchError::Transport(format!("fetch task failed: {}", e)))?
    }
}

fn default_headers(config: &HttpConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_SCHEMA));
    let agent = HeaderValue::from_str(&config.user_agent)
        .map_err(|e| SchemaError::Configuration(format!("invalid user agent: {}", e)))?;
    headers.insert(USER_AGENT, agent);
    Ok(headers)
}
