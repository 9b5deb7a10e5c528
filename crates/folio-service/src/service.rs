//! Service facade.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use folio_agent::{
    AgentError, AgentLoop, AgentOutcome, LanguageModel, Message, OpenAiModel, SearchDocumentsTool,
    SearchWebTool, ToolRegistry,
};
use folio_chunk::{ChunkAssembler, WhitespaceCounter};
use folio_core::{
    Chunk, ChunkConfig, DocumentRecord, Embedder, FolioConfig, FolioError, Page, Passage, PassageIndex,
    Result, ScoredPassage, Stats, TokenCounter, WebSearch,
};
use folio_embed::{HfTokenCounter, OnnxEmbedder};
use folio_query::{DuckDuckGo, Retriever};
use folio_store::SqliteStore;

/// Collaborators and settings a [`FolioService`] is assembled from.
pub struct ServiceParts {
    pub index: Arc<dyn PassageIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub counter: Arc<dyn TokenCounter>,
    pub model: Arc<dyn LanguageModel>,
    pub web: Arc<dyn WebSearch>,
    pub config: FolioConfig,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub owner: String,
    pub pages: usize,
    pub chunks: usize,
    /// The same content was already indexed; nothing was written.
    pub unchanged: bool,
}

/// Chunking, embedding, indexing and chat behind one handle.
pub struct FolioService {
    index: Arc<dyn PassageIndex>,
    embedder: Arc<dyn Embedder>,
    assembler: ChunkAssembler,
    retriever: Arc<Retriever>,
    agent: AgentLoop,
    chunk_config: ChunkConfig,
    /// Settings that shape stored passages; part of the change-detection hash.
    fingerprint: String,
    batch_size: usize,
}

/// Resolve an encoding identifier to a token counter.
///
/// `whitespace` selects the word counter; an existing path is read as a
/// `tokenizer.json`; anything else is fetched from the HuggingFace hub.
pub fn resolve_token_counter(encoding: &str) -> Result<Arc<dyn TokenCounter>> {
    if encoding.eq_ignore_ascii_case("whitespace") {
        return Ok(Arc::new(WhitespaceCounter));
    }
    Ok(Arc::new(HfTokenCounter::load(encoding)?))
}

impl FolioService {
    /// Assemble a service from explicit collaborators.
    pub fn new(parts: ServiceParts) -> Result<Self> {
        let ServiceParts {
            index,
            embedder,
            counter,
            model,
            web,
            config,
        } = parts;

        let chunk_config = config.chunking.budget();
        chunk_config.validate()?;

        let fingerprint = format!(
            "{}:{}:{}:{}",
            counter.encoding(),
            chunk_config.max_tokens,
            chunk_config.overlap_tokens,
            embedder.dimension()
        );

        let retriever = Arc::new(Retriever::new(index.clone(), embedder.clone()));

        let mut registry = ToolRegistry::new();
        registry
            .register(SearchDocumentsTool::new(retriever.clone()).with_limit(config.search.passage_limit))
            .map_err(|e| FolioError::internal(e.to_string()))?;
        registry
            .register(SearchWebTool::new(web))
            .map_err(|e| FolioError::internal(e.to_string()))?;

        let agent = AgentLoop::new(model, Arc::new(registry)).with_max_iterations(config.agent.max_iterations);

        Ok(Self {
            index,
            embedder,
            assembler: ChunkAssembler::new(counter),
            retriever,
            agent,
            chunk_config,
            fingerprint,
            batch_size: config.embedding.batch_size.max(1),
        })
    }

    /// Build the production stack described by `config`: SQLite index,
    /// ONNX embedder, configured tokenizer, OpenAI-compatible model and
    /// DuckDuckGo search.
    pub fn from_config(config: FolioConfig) -> Result<Self> {
        info!("Initializing folio with database at {:?}", config.database.path);

        let index = Arc::new(SqliteStore::from_config(&config.database)?);
        let embedder = Arc::new(OnnxEmbedder::from_config(&config.embedding)?);
        let counter = resolve_token_counter(&config.chunking.encoding)?;
        let model = Arc::new(OpenAiModel::from_config(&config.agent).map_err(|e| FolioError::model(e.to_string()))?);
        let web = Arc::new(DuckDuckGo::new(&config.web)?);

        Self::new(ServiceParts {
            index,
            embedder,
            counter,
            model,
            web,
            config,
        })
    }

    /// Chunk pages without embedding or storing anything.
    pub fn chunk(&self, pages: &[Page]) -> Result<Vec<Chunk>> {
        self.assembler.assemble(pages, &self.chunk_config)
    }

    /// Index `pages` as `source` for `owner`, replacing any previous copy.
    pub async fn ingest(&self, source: &str, owner: &str, pages: &[Page]) -> Result<IngestReport> {
        self.ingest_with_cancel(source, owner, pages, &CancellationToken::new())
            .await
    }

    /// Like [`FolioService::ingest`]; once `cancel` fires nothing more is
    /// written and `Cancelled` is returned.
    pub async fn ingest_with_cancel(
        &self,
        source: &str,
        owner: &str,
        pages: &[Page],
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        require("source", source)?;
        require("owner", owner)?;

        let start = Instant::now();

        if let Some(existing) = self.index.get_document(source, owner).await? {
            if !existing.content_changed(pages, &self.fingerprint) {
                info!("'{}' for owner {} is unchanged, skipping", source, owner);
                return Ok(IngestReport {
                    source: source.to_string(),
                    owner: owner.to_string(),
                    pages: pages.len(),
                    chunks: existing.chunk_count as usize,
                    unchanged: true,
                });
            }
        }

        let chunks = self.assembler.assemble_with_cancel(pages, &self.chunk_config, cancel)?;
        debug!("'{}': {} chunks from {} pages", source, chunks.len(), pages.len());

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                return Err(FolioError::Cancelled);
            }
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embedded = self.embedder.embed_documents(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(FolioError::embedding(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        if cancel.is_cancelled() {
            return Err(FolioError::Cancelled);
        }

        let passages: Vec<Passage> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (chunk, vector))| Passage::from_chunk(chunk, i as u32, vector, source, owner))
            .collect();

        let record = DocumentRecord::new(source, owner, pages, &self.fingerprint, passages.len() as u32);
        self.index.upsert(&record, &passages).await?;

        info!(
            "Ingested '{}' for owner {}: {} pages, {} chunks in {}ms",
            source,
            owner,
            pages.len(),
            passages.len(),
            start.elapsed().as_millis()
        );

        Ok(IngestReport {
            source: source.to_string(),
            owner: owner.to_string(),
            pages: pages.len(),
            chunks: passages.len(),
            unchanged: false,
        })
    }

    /// Remove `owner`'s copy of `source`. Fails with `DocumentNotFound` if absent.
    pub async fn delete(&self, source: &str, owner: &str) -> Result<usize> {
        require("source", source)?;
        require("owner", owner)?;
        self.index.delete(source, owner).await
    }

    pub async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentRecord>> {
        require("owner", owner)?;
        self.index.list_documents(owner).await
    }

    pub async fn stats(&self, owner: Option<&str>) -> Result<Stats> {
        self.index.stats(owner).await
    }

    /// Owner-scoped passage search with scores and page metadata.
    pub async fn search(&self, query: &str, owner: &str, limit: usize) -> Result<Vec<ScoredPassage>> {
        self.retriever.search_scored(query, owner, limit).await
    }

    /// Run one conversational turn for `identity`.
    pub async fn chat(&self, history: Vec<Message>, message: &str, identity: &str) -> Result<AgentOutcome> {
        self.chat_with_cancel(history, message, identity, &CancellationToken::new())
            .await
    }

    pub async fn chat_with_cancel(
        &self,
        history: Vec<Message>,
        message: &str,
        identity: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome> {
        self.agent
            .run_with_cancel(history, message, identity, cancel)
            .await
            .map_err(|e| match e {
                AgentError::InvalidRequest(m) => FolioError::invalid_argument(m),
                AgentError::Model(m) => FolioError::model(m.to_string()),
                AgentError::Cancelled => FolioError::Cancelled,
            })
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(FolioError::invalid_argument(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}
