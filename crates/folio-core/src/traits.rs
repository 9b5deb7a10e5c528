//! Core traits defining the interfaces between components.
//!
//! Every external collaborator (tokenizer, embedding model, vector index,
//! search engines) is reached through one of these traits so that callers
//! receive them as explicit dependencies and tests can substitute doubles.

use async_trait::async_trait;

use crate::error::{FolioError, Result};
use crate::types::{Chunk, DocumentRecord, Page, Passage, ScoredPassage, Stats};

/// Deterministic token counting over one fixed encoding.
///
/// Implementations must use the same encoding for counting and for
/// [`TokenCounter::tail`], so that `count(tail(text, n)) <= n`.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in text.
    fn count(&self, text: &str) -> Result<usize>;

    /// Decode the last `n` tokens of `text` back to text.
    fn tail(&self, text: &str, n: usize) -> Result<String>;

    /// Name of the encoding, for logging.
    fn encoding(&self) -> &str;
}

/// Chunking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum tokens per chunk.
    pub max_tokens: usize,

    /// Tokens carried from the end of one chunk into the next.
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            overlap_tokens: 75,
        }
    }
}

impl ChunkConfig {
    /// Reject budgets no chunk could satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens == 0 {
            return Err(FolioError::invalid_argument("max_tokens must be greater than zero"));
        }
        Ok(())
    }
}

/// Chunking strategy over paginated documents.
pub trait Chunker: Send + Sync {
    /// Chunk ordered pages into ordered chunks.
    fn chunk_pages(&self, pages: &[Page], config: &ChunkConfig) -> Result<Vec<Chunk>>;
}

/// Embedding model trait.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of passage texts.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Owner-scoped vector index of passages.
#[async_trait]
pub trait PassageIndex: Send + Sync {
    /// Store a document's passages, replacing any previous copy of the same
    /// `{source, owner}`.
    async fn upsert(&self, document: &DocumentRecord, passages: &[Passage]) -> Result<()>;

    /// Delete a document's passages for one owner. Returns the number of
    /// passages removed, or `DocumentNotFound`.
    async fn delete(&self, source: &str, owner: &str) -> Result<usize>;

    /// Nearest passages to `vector` among those owned by `owner`.
    async fn search(&self, vector: &[f32], owner: &str, limit: usize) -> Result<Vec<ScoredPassage>>;

    /// Look up a document record.
    async fn get_document(&self, source: &str, owner: &str) -> Result<Option<DocumentRecord>>;

    /// List the documents of one owner.
    async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentRecord>>;

    /// Index statistics, optionally restricted to one owner.
    async fn stats(&self, owner: Option<&str>) -> Result<Stats>;
}

/// The `search_documents` collaborator: passage retrieval strictly filtered
/// to one owner.
#[async_trait]
pub trait DocumentSearch: Send + Sync {
    async fn search_documents(&self, query: &str, owner: &str, limit: usize) -> Result<Vec<String>>;
}

/// The `search_web` collaborator.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search_web(&self, query: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_config_defaults() {
        let config = ChunkConfig::default();
        assert_eq!(config.max_tokens, 500);
        assert_eq!(config.overlap_tokens, 75);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let config = ChunkConfig {
            max_tokens: 0,
            overlap_tokens: 0,
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }
}
