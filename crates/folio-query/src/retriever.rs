//! Owner-scoped passage retrieval.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use folio_core::{DocumentSearch, Embedder, FolioError, PassageIndex, Result, ScoredPassage};

/// Embeds a query and searches the passage index, strictly within one owner.
///
/// The owner is a required argument on every call; there is no default
/// and no way to search across owners.
pub struct Retriever {
    index: Arc<dyn PassageIndex>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    /// Create a new retriever.
    pub fn new(index: Arc<dyn PassageIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { index, embedder }
    }

    /// Search and keep scores, sources and pages.
    pub async fn search_scored(&self, query: &str, owner: &str, limit: usize) -> Result<Vec<ScoredPassage>> {
        if owner.trim().is_empty() {
            return Err(FolioError::invalid_argument("owner identity is required"));
        }
        if query.trim().is_empty() {
            return Err(FolioError::invalid_argument("query must not be empty"));
        }

        let start = Instant::now();
        let vector = self.embedder.embed_query(query).await?;
        let passages = self.index.search(&vector, owner, limit).await?;

        info!(
            "Retrieved {} passages for owner {} in {}ms",
            passages.len(),
            owner,
            start.elapsed().as_millis()
        );
        debug!("Query: {:?}", query);

        Ok(passages)
    }
}

#[async_trait]
impl DocumentSearch for Retriever {
    async fn search_documents(&self, query: &str, owner: &str, limit: usize) -> Result<Vec<String>> {
        let passages = self.search_scored(query, owner, limit).await?;
        Ok(passages.into_iter().map(|p| p.text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{Chunk, DocumentRecord, Page, Passage};
    use folio_embed::MockEmbedder;
    use folio_store::SqliteStore;

    async fn seeded() -> Retriever {
        let store = Arc::new(SqliteStore::open_memory().unwrap());
        let embedder = Arc::new(MockEmbedder::new(256));

        for (owner, texts) in [
            ("alice", vec!["The whale breached beside the ship.", "Tax forms are due in April."]),
            ("bob", vec!["The whale song echoed for miles."]),
        ] {
            let vectors = embedder.embed_documents(&texts).await.unwrap();
            let passages: Vec<Passage> = texts
                .iter()
                .zip(vectors)
                .enumerate()
                .map(|(i, (text, v))| {
                    Passage::from_chunk(&Chunk::text(*text, 1, 1, None), i as u32, v, "book.pdf", owner)
                })
                .collect();
            let record = DocumentRecord::new("book.pdf", owner, &[Page::new(1, texts.join(" "))], "", 0);
            store.upsert(&record, &passages).await.unwrap();
        }

        Retriever::new(store, embedder)
    }

    #[tokio::test]
    async fn test_search_documents_ranks_relevant_first() {
        let retriever = seeded().await;
        let texts = retriever.search_documents("whale ship", "alice", 20).await.unwrap();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], "The whale breached beside the ship.");
    }

    #[tokio::test]
    async fn test_search_documents_stays_within_owner() {
        let retriever = seeded().await;
        let texts = retriever.search_documents("whale song", "alice", 20).await.unwrap();
        assert!(texts.iter().all(|t| !t.contains("song")));

        let texts = retriever.search_documents("whale song", "bob", 20).await.unwrap();
        assert_eq!(texts, vec!["The whale song echoed for miles."]);
    }

    #[tokio::test]
    async fn test_limit() {
        let retriever = seeded().await;
        let scored = retriever.search_scored("whale", "alice", 1).await.unwrap();
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].rank, 1);
        assert_eq!(scored[0].source, "book.pdf");
    }

    #[tokio::test]
    async fn test_owner_required() {
        let retriever = seeded().await;
        let err = retriever.search_documents("whale", "  ", 20).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let retriever = seeded().await;
        let err = retriever.search_documents("", "alice", 20).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }
}
