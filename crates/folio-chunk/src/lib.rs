//! folio-chunk - Page chunking
//!
//! Turns the ordered pages of a long document into retrieval-sized chunks
//! under a strict token budget.
//!
//! # Pieces
//!
//! - [`SentenceSplitter`]: splits a page into sentence-like units.
//! - [`ChapterDetector`]: spots "Chapter N" headings.
//! - [`WhitespaceCounter`]: a word-level [`TokenCounter`] for tests and
//!   tokenizer-free runs.
//! - [`ChunkAssembler`]: greedy, overlap-carrying packer that resets at
//!   chapter boundaries.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use folio_chunk::{ChunkAssembler, ChunkConfig, Page, WhitespaceCounter};
//!
//! let assembler = ChunkAssembler::new(Arc::new(WhitespaceCounter));
//! let pages = Page::from_texts(["The cat sat. It was calm."]);
//! let chunks = assembler.assemble(&pages, &ChunkConfig::default()).unwrap();
//! assert_eq!(chunks.len(), 1);
//! ```

mod assembler;
mod chapter;
mod sentence;
mod tokens;

pub use assembler::ChunkAssembler;
pub use chapter::ChapterDetector;
pub use sentence::SentenceSplitter;
pub use tokens::WhitespaceCounter;

// Re-export types for convenience
pub use folio_core::{Chunk, ChunkConfig, ChunkType, Chunker, Page, TokenCounter};
