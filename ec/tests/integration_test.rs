//! Integration tests for editchunk
//!
//! These tests drive the resolver end-to-end through the public API with a
//! stub transport, and the `ec` binary through assert_cmd.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_cmd::Command;
use async_trait::async_trait;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

use editchunk::{
    CacheKey, ChunkCache, ChunkError, ChunkResolver, ChunkTransport, ChunkVariant, Config, ContentFetcher, FileCache,
    MemoryCache, ResolveOptions, TransportResponse,
};

/// Transport that serves one canned response and counts calls
struct StubTransport {
    status: u16,
    body: Value,
    calls: AtomicUsize,
}

impl StubTransport {
    fn new(status: u16, body: Value) -> Arc<Self> {
        Arc::new(Self {
            status,
            body,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkTransport for StubTransport {
    async fn get(&self, _url: &str, _query: &[(String, String)]) -> Result<TransportResponse, ChunkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TransportResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

fn resolver_with(transport: Arc<StubTransport>, cache: Arc<dyn ChunkCache>) -> ChunkResolver {
    let config = Config::for_project("prj_test");
    ChunkResolver::new(config, ContentFetcher::new(transport, cache))
}

// =============================================================================
// Resolver Tests
// =============================================================================

#[tokio::test]
async fn test_simple_chunk_end_to_end() {
    let payload = json!({
        "content": "Hi {{user}}",
        "chunk_type": "simple",
        "variable_fallbacks": {"user": "Guest"}
    });
    let transport = StubTransport::new(200, Value::String(payload.to_string()));
    let resolver = resolver_with(transport.clone(), Arc::new(MemoryCache::new()));

    let chunk = resolver
        .resolve("cnk_hello", ResolveOptions::new().raw(true))
        .await
        .expect("resolve should succeed");

    assert_eq!(chunk.variant(), ChunkVariant::Simple);
    assert_eq!(chunk.content().unwrap(), "Hi Guest");
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_collection_item_end_to_end() {
    let payload = json!({
        "chunk_type": "collection_item",
        "collection": {"identifier": "c1"},
        "content": [{"custom_field_identifier": "t", "custom_field_name": "Title", "content": "Hello {{x}}"}],
        "variable_fallbacks": {}
    });
    let resolver = resolver_with(StubTransport::new(200, payload), Arc::new(MemoryCache::new()));

    let chunk = resolver
        .resolve("cnk_item", ResolveOptions::new().variable("x", "Y").raw(true))
        .await
        .expect("resolve should succeed");

    assert_eq!(chunk.field("t").unwrap(), "Hello Y");
    assert_eq!(chunk.field("Title").unwrap(), chunk.field("title").unwrap());
    assert_eq!(chunk.collection_id(), Some("c1"));
    assert!(matches!(chunk.content(), Err(ChunkError::WrongVariant { .. })));
}

#[tokio::test]
async fn test_marker_mode_wraps_values() {
    let payload = json!({"content": "Hi {{user}}!", "chunk_type": "single_line_text"});
    let resolver = resolver_with(StubTransport::new(200, payload), Arc::new(MemoryCache::new()));

    let chunk = resolver
        .resolve("cnk_hello", ResolveOptions::new().variable("user", "Ann"))
        .await
        .unwrap();

    assert_eq!(
        chunk.content().unwrap(),
        r#"Hi <em-var data-chunk-variable="user" data-chunk-variable-value="Ann">Ann</em-var>!"#
    );
}

#[tokio::test]
async fn test_file_cache_serves_second_resolver() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let payload = json!({"content": "Cached copy", "chunk_type": "long_text"});

    let first_transport = StubTransport::new(200, payload);
    let first = resolver_with(first_transport.clone(), Arc::new(FileCache::open(temp.path()).unwrap()));
    let chunk = first.resolve("cnk_disk", ResolveOptions::new()).await.unwrap();
    assert_eq!(chunk.content().unwrap(), "Cached copy");
    assert_eq!(first_transport.calls(), 1);

    // A new resolver over the same directory never reaches the (failing) network
    let second_transport = StubTransport::new(503, json!("unavailable"));
    let second = resolver_with(second_transport.clone(), Arc::new(FileCache::open(temp.path()).unwrap()));
    let chunk = second.resolve("cnk_disk", ResolveOptions::new()).await.unwrap();
    assert_eq!(chunk.content().unwrap(), "Cached copy");
    assert_eq!(second_transport.calls(), 0);
}

#[tokio::test]
async fn test_branches_are_cached_separately() {
    let transport = StubTransport::new(200, json!({"content": "x", "chunk_type": "single_line_text"}));
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver_with(transport.clone(), cache.clone());

    resolver.resolve("cnk", ResolveOptions::new()).await.unwrap();
    resolver.resolve("cnk", ResolveOptions::new().branch("brn_a")).await.unwrap();
    resolver.resolve("cnk", ResolveOptions::new().branch("brn_a")).await.unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(cache.len(), 2);
    assert!(cache.exists(&CacheKey::new("prj_test", Some("brn_a"), "cnk")).unwrap());
}

#[tokio::test]
async fn test_failed_fetch_surfaces_no_response() {
    let cache = Arc::new(MemoryCache::new());
    let resolver = resolver_with(StubTransport::new(401, json!("unauthorized")), cache.clone());

    let err = resolver.resolve("cnk_secret", ResolveOptions::new()).await.unwrap_err();

    assert!(matches!(err, ChunkError::NoResponse { ref identifier } if identifier == "cnk_secret"));
    assert!(!err.is_usage_error());
    assert!(cache.is_empty());
}

// =============================================================================
// CLI Tests
// =============================================================================

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("editchunk.yml");
    std::fs::write(&path, body).expect("Failed to write config");
    path
}

#[test]
fn test_cli_cache_key() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "project-id: prj_cli\n");

    let expected = CacheKey::new("prj_cli", Some("brn"), "cnk_1").to_string();

    Command::cargo_bin("ec")
        .unwrap()
        .args(["-c", config.to_str().unwrap(), "cache-key", "cnk_1", "--branch", "brn"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected));
}

#[test]
fn test_cli_content_requires_project_id() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp, "api-url: http://127.0.0.1:9\n");

    Command::cargo_bin("ec")
        .unwrap()
        .args(["-c", config.to_str().unwrap(), "content", "cnk_1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Project id not configured"));
}

#[test]
fn test_cli_rejects_bad_variable() {
    Command::cargo_bin("ec")
        .unwrap()
        .args(["content", "cnk_1", "--var", "novalue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}
