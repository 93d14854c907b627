//! Chunk resolution error types

use thiserror::Error;

/// Errors that can occur while fetching or reading a chunk
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("No response received for chunk: {identifier}")]
    NoResponse { identifier: String },

    #[error("Field identifier or field name is required")]
    MissingFieldId,

    #[error("undefined method `content` for chunk_type: {chunk_type}. Did you mean `field`?")]
    WrongVariant { chunk_type: String },

    #[error("undefined method `field` for chunk_type: {chunk_type}. Did you mean `content`?")]
    UnsupportedOperation { chunk_type: String },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChunkError {
    /// Create a NoResponse error for the given identifier
    pub fn no_response(identifier: impl Into<String>) -> Self {
        ChunkError::NoResponse {
            identifier: identifier.into(),
        }
    }

    /// Check if this error was caused by the caller rather than the remote or local store
    pub fn is_usage_error(&self) -> bool {
        match self {
            ChunkError::MissingFieldId => true,
            ChunkError::WrongVariant { .. } => true,
            ChunkError::UnsupportedOperation { .. } => true,
            ChunkError::NoResponse { .. } => false,
            ChunkError::MalformedPayload(_) => false,
            ChunkError::InvalidUrl(_) => false,
            ChunkError::Network(_) => false,
            ChunkError::Io(_) => false,
            ChunkError::Json(_) => false,
        }
    }
}
