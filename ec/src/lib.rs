//! editchunk - resolve remotely-managed content chunks into renderable text
//!
//! A chunk is a piece of editable copy (or one record of a collection)
//! stored in a CMS and addressed by identifier. Resolving a chunk fetches
//! its payload (or reads it from the cache), normalizes it, and exposes
//! interpolated text through `content()` or `field(name)`.
//!
//! # Architecture
//!
//! ```text
//! ChunkResolver ──> ContentFetcher ──> ChunkCache (memory | file)
//!       │                  └─────────> ChunkTransport (reqwest)
//!       └─> Chunk ──> interpolate ──> Sanitizer
//! ```
//!
//! # Example
//!
//! ```ignore
//! use editchunk::{ChunkResolver, Config, ResolveOptions};
//!
//! let config = Config::load(None)?;
//! let resolver = ChunkResolver::from_config(&config)?;
//! let chunk = resolver
//!     .resolve("cnk_123", ResolveOptions::new().variable("name", "Sam"))
//!     .await?;
//! println!("{}", chunk.content()?);
//! ```

pub mod cache;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod interpolate;
pub mod resolver;
pub mod sanitize;
pub mod transport;

pub use cache::{CacheKey, ChunkCache, FileCache, MemoryCache, build_cache};
pub use chunk::{Chunk, ChunkBody, ChunkSource, ChunkVariant, FieldRecord};
pub use config::{CacheBackend, CacheConfig, Config};
pub use error::ChunkError;
pub use fetcher::{ContentFetcher, normalize_payload};
pub use interpolate::{Variables, interpolate, interpolate_with, tokens};
pub use resolver::{ChunkResolver, ResolveOptions};
pub use sanitize::{HtmlSanitizer, Sanitizer};
pub use transport::{ChunkTransport, ReqwestTransport, TransportResponse};
