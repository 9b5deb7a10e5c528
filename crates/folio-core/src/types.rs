//! Core domain types for folio.

use serde::{Deserialize, Serialize};

/// One page of a source document, as produced by text extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Page number (1-based in extracted documents).
    pub number: u32,

    /// Extracted text; empty when extraction yielded nothing.
    pub text: String,
}

impl Page {
    /// Create a new page.
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// Build pages numbered from 1 from a list of page texts.
    pub fn from_texts<I, S>(texts: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Self::new(i as u32 + 1, text))
            .collect()
    }

    /// Check whether the page carries any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Kind of content held by a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Text,
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
        }
    }
}

/// A retrieval-sized passage of a document with page and chapter metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text, never empty or whitespace-only.
    pub text: String,

    /// Page on which the chunk's first content appeared.
    pub page_start: u32,

    /// Page active when the chunk was emitted.
    pub page_end: u32,

    /// Chapter the chunk belongs to, if a chapter heading has been seen.
    pub chapter_index: Option<u32>,

    /// Content kind.
    pub chunk_type: ChunkType,
}

impl Chunk {
    /// Create a new text chunk.
    pub fn text(text: impl Into<String>, page_start: u32, page_end: u32, chapter_index: Option<u32>) -> Self {
        Self {
            text: text.into(),
            page_start,
            page_end,
            chapter_index,
            chunk_type: ChunkType::Text,
        }
    }
}

/// A chunk ready for the passage index: its embedding plus ownership metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Position of the chunk within its document (0-based).
    pub chunk_index: u32,

    /// Embedding vector.
    pub vector: Vec<f32>,

    /// Chunk text.
    pub text: String,

    /// Source identifier of the document (e.g. file name).
    pub source: String,

    /// First page of the chunk.
    pub page_start: u32,

    /// Last page of the chunk.
    pub page_end: u32,

    /// Chapter of the chunk.
    pub chapter: Option<u32>,

    /// Identity of the caller that owns the document.
    pub owner: String,
}

impl Passage {
    /// Attach an embedding and ownership to a chunk.
    pub fn from_chunk(chunk: &Chunk, chunk_index: u32, vector: Vec<f32>, source: &str, owner: &str) -> Self {
        Self {
            chunk_index,
            vector,
            text: chunk.text.clone(),
            source: source.to_string(),
            page_start: chunk.page_start,
            page_end: chunk.page_end,
            chapter: chunk.chapter_index,
            owner: owner.to_string(),
        }
    }
}

/// A passage returned by a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPassage {
    /// Result rank (1-indexed).
    pub rank: u32,

    /// Cosine similarity (higher is better).
    pub score: f32,

    /// Passage text.
    pub text: String,

    /// Source identifier of the document.
    pub source: String,

    /// First page of the passage.
    pub page_start: u32,

    /// Chapter of the passage.
    pub chapter: Option<u32>,
}

/// A document indexed for one owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Source identifier (unique per owner).
    pub source: String,

    /// Owning identity.
    pub owner: String,

    /// Blake3 hash of the page texts and the chunking/embedding setup that
    /// produced the passages, for change detection.
    #[serde(with = "serde_bytes_opt")]
    pub content_hash: Option<[u8; 32]>,

    /// Number of pages in the source.
    pub page_count: u32,

    /// Number of passages stored.
    pub chunk_count: u32,

    /// Ingestion timestamp (Unix millis).
    pub created_at: u64,
}

impl DocumentRecord {
    /// Create a record for freshly chunked pages.
    ///
    /// `fingerprint` names the pipeline settings (encoding, token budget,
    /// embedder) the passages were built with.
    pub fn new(source: &str, owner: &str, pages: &[Page], fingerprint: &str, chunk_count: u32) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            source: source.to_string(),
            owner: owner.to_string(),
            content_hash: Some(Self::hash_pages(pages, fingerprint)),
            page_count: pages.len() as u32,
            chunk_count,
            created_at: now,
        }
    }

    /// Hash page texts in order, separated so that page boundaries matter.
    pub fn hash_pages(pages: &[Page], fingerprint: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(fingerprint.as_bytes());
        hasher.update(&[0x00]);
        for page in pages {
            hasher.update(&page.number.to_le_bytes());
            hasher.update(page.text.as_bytes());
            hasher.update(&[0x0c]);
        }
        *hasher.finalize().as_bytes()
    }

    /// Check if the pages or the pipeline settings differ from what was indexed.
    pub fn content_changed(&self, pages: &[Page], fingerprint: &str) -> bool {
        self.content_hash
            .map(|h| h != Self::hash_pages(pages, fingerprint))
            .unwrap_or(true)
    }
}

/// Statistics about the passage index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Number of documents.
    pub documents: u64,

    /// Number of passages.
    pub passages: u64,

    /// Number of distinct owners.
    pub owners: u64,

    /// Database size in bytes.
    pub storage_bytes: u64,

    /// Optional owner filter applied.
    pub owner: Option<String>,
}

/// Helper module for optional byte array serialization.
mod serde_bytes_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => hex::encode(bytes).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(hex) => {
                let bytes = hex::decode(&hex).map_err(serde::de::Error::custom)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("invalid hash length"))?;
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }
}
