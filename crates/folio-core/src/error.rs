//! Error types for folio.

use thiserror::Error;

/// Result type alias using FolioError.
pub type Result<T> = std::result::Result<T, FolioError>;

/// Errors raised by the chunking, embedding, storage and retrieval layers.
#[derive(Error, Debug)]
pub enum FolioError {
    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Tokenizer could not be loaded or failed to encode/decode.
    #[error("Tokenizer error: {message}")]
    Tokenizer { message: String },

    /// Embedding model error.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Database error.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Chunking error.
    #[error("Chunking error: {message}")]
    Chunking { message: String },

    /// Text could not be extracted from a source document.
    #[error("Extraction failed for {source_name}: {reason}")]
    Extraction { source_name: String, reason: String },

    /// Passage or web search failed.
    #[error("Search error: {message}")]
    Search { message: String },

    /// Language model collaborator failed.
    #[error("Model error: {message}")]
    Model { message: String },

    /// No document with this source exists for the owner.
    #[error("Document not found: {source_name} (owner {owner})")]
    DocumentNotFound { source_name: String, owner: String },

    /// The operation was cancelled before it produced a result.
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl FolioError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a tokenizer error.
    pub fn tokenizer(message: impl Into<String>) -> Self {
        Self::Tokenizer {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a chunking error.
    pub fn chunking(message: impl Into<String>) -> Self {
        Self::Chunking {
            message: message.into(),
        }
    }

    /// Create a search error.
    pub fn search(message: impl Into<String>) -> Self {
        Self::Search {
            message: message.into(),
        }
    }

    /// Create a model error.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for callers that surface errors over a wire.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Tokenizer { .. } => "TOKENIZER_ERROR",
            Self::Embedding { .. } => "EMBEDDING_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Chunking { .. } => "CHUNKING_ERROR",
            Self::Extraction { .. } => "EXTRACTION_ERROR",
            Self::Search { .. } => "SEARCH_ERROR",
            Self::Model { .. } => "MODEL_ERROR",
            Self::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            Self::Cancelled => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FolioError::DocumentNotFound {
            source_name: "moby-dick.pdf".to_string(),
            owner: "ishmael@example.com".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("moby-dick.pdf"));
        assert!(text.contains("ishmael@example.com"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(FolioError::tokenizer("bad vocab").error_code(), "TOKENIZER_ERROR");
        assert_eq!(FolioError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(FolioError::database("locked").error_code(), "DATABASE_ERROR");
    }
}
