//! Chunk resolver - turns an identifier into a `Chunk`

use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{CacheKey, build_cache};
use crate::chunk::{Chunk, ChunkSource};
use crate::config::Config;
use crate::error::ChunkError;
use crate::fetcher::{ContentFetcher, normalize_payload};
use crate::interpolate::Variables;
use crate::sanitize::{HtmlSanitizer, Sanitizer};
use crate::transport::ReqwestTransport;

/// Per-call options for `ChunkResolver::resolve`
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Branch to fetch; an empty string means no branch
    pub branch_id: Option<String>,
    /// Call-site token values
    pub variables: Variables,
    /// Insert substituted values without the marker element
    pub raw: bool,
    /// Pre-fetched payload; skips the fetcher entirely
    pub response: Option<Value>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branch(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    pub fn response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    fn branch_id(&self) -> Option<&str> {
        self.branch_id.as_deref().filter(|b| !b.is_empty())
    }
}

/// Resolves chunk identifiers against one project configuration
#[derive(Clone)]
pub struct ChunkResolver {
    config: Config,
    fetcher: ContentFetcher,
    sanitizer: Arc<dyn Sanitizer>,
}

impl ChunkResolver {
    pub fn new(config: Config, fetcher: ContentFetcher) -> Self {
        Self {
            config,
            fetcher,
            sanitizer: Arc::new(HtmlSanitizer::new()),
        }
    }

    /// Create a resolver using the reqwest transport and the configured cache
    pub fn from_config(config: &Config) -> Result<Self, ChunkError> {
        debug!(project_id = %config.project_id, "ChunkResolver::from_config: called");
        let transport = Arc::new(ReqwestTransport::from_config(config)?);
        let cache = build_cache(&config.cache)?;
        Ok(Self::new(config.clone(), ContentFetcher::new(transport, cache)))
    }

    /// Replace the sanitizer used for content and substituted values
    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// API URL for a chunk identifier
    ///
    /// The identifier is a single percent-encoded path segment, so `/`, `?`
    /// and `#` inside it cannot change the path or add query parameters.
    pub fn chunk_url(&self, identifier: &str) -> Result<String, ChunkError> {
        let root = self.config.api_root();
        let mut url = Url::parse(&root).map_err(|e| ChunkError::InvalidUrl(format!("{}: {}", root, e)))?;
        url.path_segments_mut()
            .map_err(|_| ChunkError::InvalidUrl(root.clone()))?
            .pop_if_empty()
            .push("chunks")
            .push(identifier);
        Ok(url.into())
    }

    /// Query parameters sent with a chunk request
    pub fn query_params(&self, branch_id: Option<&str>) -> Vec<(String, String)> {
        let mut params = vec![("project_id".to_string(), self.config.project_id.clone())];
        if let Some(branch) = branch_id.filter(|b| !b.is_empty()) {
            params.push(("branch_id".to_string(), branch.to_string()));
        }
        params
    }

    /// Cache key for a chunk identifier on an optional branch
    pub fn cache_key(&self, identifier: &str, branch_id: Option<&str>) -> CacheKey {
        CacheKey::new(&self.config.project_id, branch_id, identifier)
    }

    /// Resolve `identifier` into a chunk
    ///
    /// Uses `options.response` when given, otherwise the cache, otherwise the API.
    pub async fn resolve(&self, identifier: &str, options: ResolveOptions) -> Result<Chunk, ChunkError> {
        debug!(%identifier, ?options.branch_id, raw = options.raw, "ChunkResolver::resolve: called");
        let branch_id = options.branch_id();
        let source = ChunkSource {
            identifier: identifier.to_string(),
            project_id: self.config.project_id.clone(),
            url: self.chunk_url(identifier)?,
            cache_key: self.cache_key(identifier, branch_id),
        };
        let query = self.query_params(branch_id);

        let payload = match options.response {
            Some(response) => {
                debug!(%identifier, "ChunkResolver::resolve: using supplied response");
                normalize_payload(response)
            }
            None => {
                self.fetcher
                    .fetch(identifier, &source.url, &query, &source.cache_key)
                    .await?
            }
        };

        let chunk = Chunk::from_payload(source, &payload, options.variables, options.raw, self.sanitizer.clone())?;
        info!(%identifier, chunk_type = %chunk.chunk_type(), "Resolved chunk");
        Ok(chunk)
    }
}
