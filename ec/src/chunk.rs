//! Chunk model - normalized payload state and accessors

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::cache::CacheKey;
use crate::error::ChunkError;
use crate::interpolate::{Variables, interpolate_with};
use crate::sanitize::Sanitizer;

/// `chunk_type` value that marks a collection item
pub const COLLECTION_ITEM: &str = "collection_item";

/// Which accessor a chunk supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkVariant {
    /// Freeform copy, read with `content()`
    Simple,
    /// One record of a collection, read with `field(name)`
    CollectionItem,
}

/// One field of a collection item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRecord {
    /// Field slug
    pub field_identifier: String,
    /// Display label
    pub field_name: String,
    pub content: String,
}

impl FieldRecord {
    /// Case-insensitive match against the slug or the display label
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.field_identifier.to_lowercase() == name || self.field_name.to_lowercase() == name
    }
}

/// Variant-specific chunk content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkBody {
    Simple { content: String },
    CollectionItem { fields: Vec<FieldRecord>, collection_id: String },
}

/// Where a chunk lives and how it was addressed
#[derive(Debug, Clone)]
pub struct ChunkSource {
    pub identifier: String,
    pub project_id: String,
    pub url: String,
    pub cache_key: CacheKey,
}

/// A resolved chunk
///
/// Immutable after construction. `content()` and `field()` compute the
/// interpolated text on every call.
#[derive(Clone)]
pub struct Chunk {
    source: ChunkSource,
    branch_id: Option<String>,
    chunk_type: String,
    body: ChunkBody,
    variable_fallbacks: Variables,
    variable_values: Variables,
    raw: bool,
    sanitizer: Arc<dyn Sanitizer>,
}

impl Chunk {
    /// Build a chunk from a structured payload
    ///
    /// Reads `content`, `chunk_type`, `variable_fallbacks`, `branch_id` and,
    /// for collection items, `collection.identifier`. The payload's
    /// `branch_id` replaces whatever branch the caller asked for.
    pub fn from_payload(
        source: ChunkSource,
        payload: &Value,
        variable_values: Variables,
        raw: bool,
        sanitizer: Arc<dyn Sanitizer>,
    ) -> Result<Self, ChunkError> {
        debug!(identifier = %source.identifier, "Chunk::from_payload: called");
        let obj = payload
            .as_object()
            .ok_or_else(|| malformed(&source.identifier, "payload is not an object"))?;

        let chunk_type = obj
            .get("chunk_type")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(&source.identifier, "has no chunk_type"))?
            .to_string();

        let body = if chunk_type == COLLECTION_ITEM {
            parse_collection_item(&source.identifier, obj)?
        } else {
            let content = match obj.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) => String::new(),
                _ => {
                    return Err(ChunkError::MalformedPayload(format!(
                        "chunk {} of type {} has no string content",
                        source.identifier, chunk_type
                    )));
                }
            };
            ChunkBody::Simple { content }
        };

        let variable_fallbacks = match obj.get("variable_fallbacks") {
            Some(Value::Object(map)) => string_map(map),
            _ => Variables::new(),
        };

        let branch_id = obj
            .get("branch_id")
            .and_then(Value::as_str)
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        debug!(%chunk_type, ?branch_id, "Chunk::from_payload: normalized");
        Ok(Self {
            source,
            branch_id,
            chunk_type,
            body,
            variable_fallbacks,
            variable_values,
            raw,
            sanitizer,
        })
    }

    /// Interpolated content of a simple chunk
    pub fn content(&self) -> Result<String, ChunkError> {
        match &self.body {
            ChunkBody::Simple { content } => Ok(self.render(content)),
            ChunkBody::CollectionItem { .. } => Err(ChunkError::WrongVariant {
                chunk_type: self.chunk_type.clone(),
            }),
        }
    }

    /// Interpolated content of a collection item field, by slug or display name
    pub fn field(&self, name: &str) -> Result<String, ChunkError> {
        let fields = match &self.body {
            ChunkBody::CollectionItem { fields, .. } => fields,
            ChunkBody::Simple { .. } => {
                return Err(ChunkError::UnsupportedOperation {
                    chunk_type: self.chunk_type.clone(),
                });
            }
        };

        if name.trim().is_empty() {
            return Err(ChunkError::MissingFieldId);
        }

        let record = fields
            .iter()
            .find(|f| f.matches(name))
            .ok_or_else(|| ChunkError::no_response(name))?;

        Ok(self.render(&record.content))
    }

    fn render(&self, text: &str) -> String {
        interpolate_with(
            self.sanitizer.as_ref(),
            text,
            &self.variable_fallbacks,
            &self.variable_values,
            self.raw,
        )
    }

    pub fn identifier(&self) -> &str {
        &self.source.identifier
    }

    pub fn project_id(&self) -> &str {
        &self.source.project_id
    }

    /// Branch reported by the server
    pub fn branch_id(&self) -> Option<&str> {
        self.branch_id.as_deref()
    }

    /// Server chunk type, e.g. `single_line_text` or `collection_item`
    pub fn chunk_type(&self) -> &str {
        &self.chunk_type
    }

    pub fn variant(&self) -> ChunkVariant {
        match self.body {
            ChunkBody::Simple { .. } => ChunkVariant::Simple,
            ChunkBody::CollectionItem { .. } => ChunkVariant::CollectionItem,
        }
    }

    pub fn collection_id(&self) -> Option<&str> {
        match &self.body {
            ChunkBody::CollectionItem { collection_id, .. } => Some(collection_id),
            ChunkBody::Simple { .. } => None,
        }
    }

    /// Field records of a collection item; empty for simple chunks
    pub fn fields(&self) -> &[FieldRecord] {
        match &self.body {
            ChunkBody::CollectionItem { fields, .. } => fields,
            ChunkBody::Simple { .. } => &[],
        }
    }

    pub fn variable_fallbacks(&self) -> &Variables {
        &self.variable_fallbacks
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.source.cache_key
    }

    pub fn url(&self) -> &str {
        &self.source.url
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("source", &self.source)
            .field("branch_id", &self.branch_id)
            .field("chunk_type", &self.chunk_type)
            .field("body", &self.body)
            .field("variable_fallbacks", &self.variable_fallbacks)
            .field("raw", &self.raw)
            .finish()
    }
}

fn parse_collection_item(identifier: &str, obj: &Map<String, Value>) -> Result<ChunkBody, ChunkError> {
    let collection_id = obj
        .get("collection")
        .and_then(|c| c.get("identifier"))
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(identifier, "has no collection.identifier"))?
        .to_string();

    let entries = obj
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(identifier, "content is not a list"))?;

    let mut fields = Vec::with_capacity(entries.len());
    for entry in entries {
        let field_identifier = required_str(identifier, entry, "custom_field_identifier")?;
        let field_name = required_str(identifier, entry, "custom_field_name")?;
        let content = match entry.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        fields.push(FieldRecord {
            field_identifier,
            field_name,
            content,
        });
    }

    debug!(%identifier, %collection_id, field_count = fields.len(), "parse_collection_item: parsed");
    Ok(ChunkBody::CollectionItem { fields, collection_id })
}

fn required_str(identifier: &str, entry: &Value, key: &str) -> Result<String, ChunkError> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(identifier, &format!("field is missing {}", key)))
}

fn malformed(identifier: &str, problem: &str) -> ChunkError {
    ChunkError::MalformedPayload(format!("chunk {} {}", identifier, problem))
}

/// Convert a JSON object of fallbacks into strings, skipping nulls
fn string_map(map: &Map<String, Value>) -> Variables {
    map.iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.clone(), s.clone())),
            Value::Null => None,
            other => Some((k.clone(), other.to_string())),
        })
        .collect()
}
