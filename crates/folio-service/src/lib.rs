//! folio-service - Application facade
//!
//! Wires the chunking engine, embedder, passage index, retrieval tools and
//! agent loop into one [`FolioService`].
//!
//! # Operations
//!
//! - `ingest` - chunk pages, embed the chunks and replace the owner's copy
//!   of the source in the index
//! - `delete` - remove one owner's copy of a source
//! - `list_documents` / `stats` - inspect the index
//! - `search` - owner-scoped passage retrieval
//! - `chat` - one conversational turn with tool use

mod extract;
mod service;

pub use extract::{load_pages, pdf_pages, text_pages};
pub use service::{resolve_token_counter, FolioService, IngestReport, ServiceParts};
