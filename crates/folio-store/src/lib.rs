//! folio-store - Owner-scoped passage index on SQLite
//!
//! Documents and their embedded passages are stored per `(source, owner)`.
//! Similarity search is an exact cosine scan over the requesting owner's
//! passages, so no other owner's rows are ever read for a query.

mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

// Re-export schema for testing/migrations
pub use schema::{SCHEMA, SCHEMA_VERSION};
