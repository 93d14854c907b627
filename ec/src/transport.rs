//! HTTP transport for retrieving chunk payloads

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::ChunkError;

/// Raw response from the chunk API
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Body, either structured or a JSON string holding the raw text
    pub body: Value,
}

impl TransportResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Issues a GET for a chunk URL with query parameters
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<TransportResponse, ChunkError>;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Create a transport using the configured timeout
    pub fn from_config(config: &Config) -> Result<Self, ChunkError> {
        debug!(timeout_ms = config.timeout_ms, "ReqwestTransport::from_config: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("editchunk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ChunkTransport for ReqwestTransport {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<TransportResponse, ChunkError> {
        debug!(%url, ?query, "ReqwestTransport::get: sending request");
        let response = self.http.get(url).query(query).send().await?;

        let status = response.status().as_u16();
        debug!(%status, "ReqwestTransport::get: response received");

        let text = response.text().await?;
        Ok(TransportResponse {
            status,
            body: Value::String(text),
        })
    }
}
