//! Database schema definitions.

/// Main schema SQL for initializing the database.
pub const SCHEMA: &str = r#"
-- One row per indexed (source, owner) pair
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    source TEXT NOT NULL,
    owner TEXT NOT NULL,
    content_hash BLOB,
    page_count INTEGER NOT NULL,
    chunk_count INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (source, owner)
);

CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner);

-- Embedded passages; owner is denormalized so searches never join
CREATE TABLE IF NOT EXISTS passages (
    id TEXT PRIMARY KEY,
    doc_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    source TEXT NOT NULL,
    owner TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    page_start INTEGER NOT NULL,
    page_end INTEGER NOT NULL,
    chapter INTEGER,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_passages_owner ON passages(owner);
CREATE INDEX IF NOT EXISTS idx_passages_doc_id ON passages(doc_id);
"#;

/// Schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: u32 = 1;
