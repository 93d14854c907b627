//! Content fetcher - cache-or-fetch for chunk payloads

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheKey, ChunkCache};
use crate::error::ChunkError;
use crate::transport::ChunkTransport;

/// Fetches chunk payloads, consulting the cache before the network
#[derive(Clone)]
pub struct ContentFetcher {
    transport: Arc<dyn ChunkTransport>,
    cache: Arc<dyn ChunkCache>,
}

impl ContentFetcher {
    pub fn new(transport: Arc<dyn ChunkTransport>, cache: Arc<dyn ChunkCache>) -> Self {
        Self { transport, cache }
    }

    /// The cache this fetcher reads and populates
    /// Return the payload for `cache_key`, fetching `url` on a cache miss
    ///
    /// A successful (200) fetch is stored in the cache before returning.
    /// Any other status with nothing cached fails with `NoResponse`.
    pub async fn fetch(
        &self,
        identifier: &str,
        url: &str,
        query: &[(String, String)],
        cache_key: &CacheKey,
    ) -> Result<Value, ChunkError> {
        debug!(%identifier, %cache_key, "ContentFetcher::fetch: called");

        if let Some(cached) = self.cache.get(cache_key)? {
            debug!(%cache_key, "ContentFetcher::fetch: cache hit");
            return Ok(normalize_payload(cached));
        }

        debug!(%url, "ContentFetcher::fetch: cache miss, requesting");
        let response = self.transport.get(url, query).await?;

        if !response.is_ok() {
            warn!(%identifier, status = response.status, "ContentFetcher::fetch: no usable response");
            return Err(ChunkError::no_response(identifier));
        }

        let payload = normalize_payload(response.body);
        self.cache.set(cache_key, payload.clone())?;
        debug!(%cache_key, "ContentFetcher::fetch: cached response");

        Ok(payload)
    }
}

/// Turn a text payload that parses as JSON into structured JSON
///
/// Text that does not parse is passed through unchanged as a string.
pub fn normalize_payload(payload: Value) -> Value {
    match payload {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => parsed,
            Err(_) => {
                debug!("normalize_payload: body is not JSON, passing through");
                Value::String(text)
            }
        },
        other => other,
    }
}
