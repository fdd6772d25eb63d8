//! HTTP transport used by the Index Extractor and the Archive Fetcher
//!
//! Stages talk to the network only through [`Transport`], which lets tests substitute a
//! counting or failing implementation.

use crate::error::{Error, FetchError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Fetches the full body of a URL
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the body; non-2xx answers are errors
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// reqwest-backed transport
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a client with the given per-request timeout and User-Agent
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Other(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e, self.timeout))?;

        tracing::debug!(url, bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }
}
