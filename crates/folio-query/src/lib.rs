//! folio-query - Retrieval collaborators for the conversational agent
//!
//! # Features
//!
//! - [`Retriever`]: embeds a query and searches one owner's passages
//!   (the `search_documents` capability)
//! - [`DuckDuckGo`]: instant-answer web search flattened to plain text
//!   (the `search_web` capability)
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_query::Retriever;
//! use std::sync::Arc;
//!
//! let retriever = Retriever::new(Arc::new(store), Arc::new(embedder));
//! let passages = retriever.search_documents("who is Ishmael", "alice", 20).await?;
//! ```

mod retriever;
mod web;

pub use retriever::Retriever;
pub use web::DuckDuckGo;

// Re-export for convenience
pub use folio_core::{DocumentSearch, ScoredPassage, WebSearch};
