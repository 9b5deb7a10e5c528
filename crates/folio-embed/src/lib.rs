//! folio-embed - Tokenizer and embedding model wrappers
//!
//! # Features
//!
//! - [`HfTokenCounter`]: exact token counting and tail decoding over one
//!   fixed `tokenizer.json` encoding (local file or hub id)
//! - [`OnnxEmbedder`]: ONNX Runtime sentence embeddings with attention-masked
//!   mean pooling and L2 normalization
//! - [`MockEmbedder`]: deterministic hashing embedder for tests

mod mock;
mod onnx;
mod tokenizer;

pub use mock::MockEmbedder;
pub use onnx::OnnxEmbedder;
pub use tokenizer::HfTokenCounter;

// Re-export the traits for convenience
pub use folio_core::{Embedder, TokenCounter};
