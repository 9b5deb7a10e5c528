//! SQLite-based passage index.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};
use ulid::Ulid;

use folio_core::{
    DatabaseConfig, DocumentRecord, FolioError, PassageIndex, Passage, Result, ScoredPassage, Stats,
};

use crate::schema::{SCHEMA, SCHEMA_VERSION};

/// SQLite-backed [`PassageIndex`].
///
/// A single connection is guarded by a blocking mutex; every statement runs
/// while the lock is held, so one `upsert` is atomic with respect to other
/// callers sharing the store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, Duration::from_millis(30_000))
    }

    /// Open the database described by `config`.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::open_with_timeout(&config.path, Duration::from_millis(config.busy_timeout_ms as u64))
    }

    fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| FolioError::database(format!("Failed to open database: {}", e)))?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| FolioError::database(format!("Failed to set busy timeout: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            .map_err(|e| FolioError::database(format!("Failed to configure journal: {}", e)))?;

        info!("Database opened at {:?}", path);
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FolioError::database(format!("Failed to open in-memory database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA temp_store = MEMORY;")
            .map_err(|e| FolioError::database(format!("Failed to configure connection: {}", e)))?;

        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| FolioError::database(format!("Failed to read schema version: {}", e)))?;
        if version > SCHEMA_VERSION {
            return Err(FolioError::database(format!(
                "Database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }

        conn.execute_batch(SCHEMA)
            .map_err(|e| FolioError::database(format!("Failed to initialize schema: {}", e)))?;
        if version < SCHEMA_VERSION {
            debug!("Schema version {} -> {}", version, SCHEMA_VERSION);
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(|e| FolioError::database(format!("Failed to record schema version: {}", e)))?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self.conn.lock().map_err(|e| FolioError::database(e.to_string()))?;
        f(&mut conn)
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
        let hash: Option<Vec<u8>> = row.get(2)?;
        Ok(DocumentRecord {
            source: row.get(0)?,
            owner: row.get(1)?,
            content_hash: hash.and_then(|v| v.try_into().ok()),
            page_count: row.get(3)?,
            chunk_count: row.get(4)?,
            created_at: row.get::<_, i64>(5)? as u64,
        })
    }
}

fn db_err(e: rusqlite::Error) -> FolioError {
    FolioError::database(e.to_string())
}

/// Encode a vector as little-endian f32 bytes.
fn vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_vec(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

#[async_trait]
impl PassageIndex for SqliteStore {
    async fn upsert(&self, document: &DocumentRecord, passages: &[Passage]) -> Result<()> {
        if let Some(p) = passages
            .iter()
            .find(|p| p.source != document.source || p.owner != document.owner)
        {
            return Err(FolioError::invalid_argument(format!(
                "passage for '{}'/'{}' does not belong to document '{}'/'{}'",
                p.source, p.owner, document.source, document.owner
            )));
        }

        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(db_err)?;

            // Replacing cascades to the previous passages.
            tx.execute(
                "DELETE FROM documents WHERE source = ?1 AND owner = ?2",
                params![document.source, document.owner],
            )
            .map_err(db_err)?;

            let doc_id = Ulid::new().to_string();
            tx.execute(
                r#"
                INSERT INTO documents (id, source, owner, content_hash, page_count, chunk_count, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    doc_id,
                    document.source,
                    document.owner,
                    document.content_hash.as_ref().map(|h| h.as_slice()),
                    document.page_count,
                    passages.len() as u32,
                    document.created_at as i64,
                ],
            )
            .map_err(db_err)?;

            {
                let mut stmt = tx
                    .prepare(
                        r#"
                        INSERT INTO passages
                            (id, doc_id, source, owner, chunk_index, text, page_start, page_end, chapter, embedding)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                        "#,
                    )
                    .map_err(db_err)?;

                for passage in passages {
                    stmt.execute(params![
                        Ulid::new().to_string(),
                        doc_id,
                        passage.source,
                        passage.owner,
                        passage.chunk_index,
                        passage.text,
                        passage.page_start,
                        passage.page_end,
                        passage.chapter,
                        vec_to_bytes(&passage.vector),
                    ])
                    .map_err(db_err)?;
                }
            }

            tx.commit().map_err(db_err)?;
            debug!(
                "Stored {} passages for '{}' (owner {})",
                passages.len(),
                document.source,
                document.owner
            );
            Ok(())
        })
    }

    async fn delete(&self, source: &str, owner: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(db_err)?;

            let doc_id: Option<String> = tx
                .query_row(
                    "SELECT id FROM documents WHERE source = ?1 AND owner = ?2",
                    params![source, owner],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;

            let doc_id = doc_id.ok_or_else(|| FolioError::DocumentNotFound {
                source_name: source.to_string(),
                owner: owner.to_string(),
            })?;

            let removed = tx
                .execute("DELETE FROM passages WHERE doc_id = ?1", params![doc_id])
                .map_err(db_err)?;
            tx.execute("DELETE FROM documents WHERE id = ?1", params![doc_id])
                .map_err(db_err)?;
            tx.commit().map_err(db_err)?;

            info!("Deleted '{}' for owner {} ({} passages)", source, owner, removed);
            Ok(removed)
        })
    }

    async fn search(&self, vector: &[f32], owner: &str, limit: usize) -> Result<Vec<ScoredPassage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT text, source, page_start, chapter, embedding
                    FROM passages
                    WHERE owner = ?1
                    ORDER BY source, chunk_index
                    "#,
                )
                .map_err(db_err)?;

            let mut scored = Vec::new();
            let mut rows = stmt.query(params![owner]).map_err(db_err)?;
            while let Some(row) = rows.next().map_err(db_err)? {
                let embedding: Vec<u8> = row.get(4).map_err(db_err)?;
                let stored = bytes_to_vec(&embedding);
                if stored.len() != vector.len() {
                    return Err(FolioError::search(format!(
                        "query has {} dimensions but stored passages have {}",
                        vector.len(),
                        stored.len()
                    )));
                }

                scored.push(ScoredPassage {
                    rank: 0,
                    score: cosine(vector, &stored),
                    text: row.get(0).map_err(db_err)?,
                    source: row.get(1).map_err(db_err)?,
                    page_start: row.get(2).map_err(db_err)?,
                    chapter: row.get(3).map_err(db_err)?,
                });
            }

            // Stable sort keeps document order among equal scores.
            scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            scored.truncate(limit);
            for (i, passage) in scored.iter_mut().enumerate() {
                passage.rank = i as u32 + 1;
            }

            debug!("Search for owner {} returned {} passages", owner, scored.len());
            Ok(scored)
        })
    }

    async fn get_document(&self, source: &str, owner: &str) -> Result<Option<DocumentRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                r#"
                SELECT source, owner, content_hash, page_count, chunk_count, created_at
                FROM documents WHERE source = ?1 AND owner = ?2
                "#,
                params![source, owner],
                Self::row_to_document,
            )
            .optional()
            .map_err(db_err)
        })
    }

    async fn list_documents(&self, owner: &str) -> Result<Vec<DocumentRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT source, owner, content_hash, page_count, chunk_count, created_at
                    FROM documents WHERE owner = ?1 ORDER BY source
                    "#,
                )
                .map_err(db_err)?;

            let documents = stmt
                .query_map(params![owner], Self::row_to_document)
                .map_err(db_err)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err)?;

            Ok(documents)
        })
    }

    async fn stats(&self, owner: Option<&str>) -> Result<Stats> {
        self.with_conn(|conn| {
            let count = |sql: &str, owner: Option<&str>| -> Result<u64> {
                let n: i64 = match owner {
                    Some(o) => conn.query_row(sql, params![o], |row| row.get(0)),
                    None => conn.query_row(sql, [], |row| row.get(0)),
                }
                .map_err(db_err)?;
                Ok(n as u64)
            };

            let (documents, passages, owners) = match owner {
                Some(o) => (
                    count("SELECT COUNT(*) FROM documents WHERE owner = ?1", Some(o))?,
                    count("SELECT COUNT(*) FROM passages WHERE owner = ?1", Some(o))?,
                    count("SELECT COUNT(DISTINCT owner) FROM documents WHERE owner = ?1", Some(o))?,
                ),
                None => (
                    count("SELECT COUNT(*) FROM documents", None)?,
                    count("SELECT COUNT(*) FROM passages", None)?,
                    count("SELECT COUNT(DISTINCT owner) FROM documents", None)?,
                ),
            };

            let page_count: i64 = conn
                .query_row("PRAGMA page_count", [], |row| row.get(0))
                .unwrap_or(0);
            let page_size: i64 = conn
                .query_row("PRAGMA page_size", [], |row| row.get(0))
                .unwrap_or(4096);

            Ok(Stats {
                documents,
                passages,
                owners,
                storage_bytes: (page_count * page_size) as u64,
                owner: owner.map(String::from),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{Chunk, Page};

    fn record(source: &str, owner: &str, text: &str) -> DocumentRecord {
        DocumentRecord::new(source, owner, &[Page::new(1, text)], "", 0)
    }

    fn passage(source: &str, owner: &str, index: u32, text: &str, vector: Vec<f32>) -> Passage {
        let chunk = Chunk::text(text, 1, 1, None);
        Passage::from_chunk(&chunk, index, vector, source, owner)
    }

    #[tokio::test]
    async fn test_open_memory() {
        let store = SqliteStore::open_memory().unwrap();
        let stats = store.stats(None).await.unwrap();
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.passages, 0);
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("folio.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            let doc = record("a.pdf", "alice", "text");
            store
                .upsert(&doc, &[passage("a.pdf", "alice", 0, "text", vec![1.0, 0.0])])
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_documents("alice").await.unwrap().len(), 1);
    }

    #[test]
    fn test_schema_version_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.db");
        drop(SqliteStore::open(&path).unwrap());

        let conn = Connection::open(&path).unwrap();
        let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.db");
        drop(SqliteStore::open(&path).unwrap());

        let conn = Connection::open(&path).unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1).unwrap();
        drop(conn);

        let err = SqliteStore::open(&path).err().unwrap();
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.to_string().contains("newer"));
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = SqliteStore::open_memory().unwrap();
        let doc = record("moby.pdf", "alice", "Call me Ishmael.");
        let passages = vec![
            passage("moby.pdf", "alice", 0, "Call me Ishmael.", vec![1.0, 0.0]),
            passage("moby.pdf", "alice", 1, "Some years ago.", vec![0.0, 1.0]),
        ];
        store.upsert(&doc, &passages).await.unwrap();

        let fetched = store.get_document("moby.pdf", "alice").await.unwrap().unwrap();
        assert_eq!(fetched.chunk_count, 2);
        assert_eq!(fetched.content_hash, doc.content_hash);
        assert!(store.get_document("moby.pdf", "bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_previous_passages() {
        let store = SqliteStore::open_memory().unwrap();
        let doc = record("a.pdf", "alice", "v1");
        store
            .upsert(&doc, &[
                passage("a.pdf", "alice", 0, "old one", vec![1.0, 0.0]),
                passage("a.pdf", "alice", 1, "old two", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let doc = record("a.pdf", "alice", "v2");
        store
            .upsert(&doc, &[passage("a.pdf", "alice", 0, "new", vec![1.0, 0.0])])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], "alice", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "new");
        assert_eq!(store.stats(None).await.unwrap().documents, 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_foreign_passage() {
        let store = SqliteStore::open_memory().unwrap();
        let doc = record("a.pdf", "alice", "x");
        let err = store
            .upsert(&doc, &[passage("a.pdf", "bob", 0, "x", vec![1.0])])
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_search_ranks_by_cosine() {
        let store = SqliteStore::open_memory().unwrap();
        let doc = record("a.pdf", "alice", "x");
        store
            .upsert(&doc, &[
                passage("a.pdf", "alice", 0, "orthogonal", vec![0.0, 1.0]),
                passage("a.pdf", "alice", 1, "exact", vec![1.0, 0.0]),
                passage("a.pdf", "alice", 2, "close", vec![0.9, 0.1]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], "alice", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "exact");
        assert_eq!(results[0].rank, 1);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].text, "close");
        assert_eq!(results[1].rank, 2);
    }

    #[tokio::test]
    async fn test_search_is_owner_scoped() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .upsert(
                &record("shared.pdf", "alice", "a"),
                &[passage("shared.pdf", "alice", 0, "alice secret", vec![1.0, 0.0])],
            )
            .await
            .unwrap();
        store
            .upsert(
                &record("shared.pdf", "bob", "b"),
                &[passage("shared.pdf", "bob", 0, "bob secret", vec![1.0, 0.0])],
            )
            .await
            .unwrap();

        let alice = store.search(&[1.0, 0.0], "alice", 10).await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].text, "alice secret");

        assert!(store.search(&[1.0, 0.0], "carol", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_dimension_mismatch() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .upsert(&record("a.pdf", "alice", "x"), &[passage("a.pdf", "alice", 0, "x", vec![1.0, 0.0])])
            .await
            .unwrap();

        let err = store.search(&[1.0, 0.0, 0.0], "alice", 5).await.unwrap_err();
        assert_eq!(err.error_code(), "SEARCH_ERROR");
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped() {
        let store = SqliteStore::open_memory().unwrap();
        for owner in ["alice", "bob"] {
            store
                .upsert(
                    &record("book.pdf", owner, owner),
                    &[
                        passage("book.pdf", owner, 0, "one", vec![1.0]),
                        passage("book.pdf", owner, 1, "two", vec![1.0]),
                    ],
                )
                .await
                .unwrap();
        }

        let removed = store.delete("book.pdf", "alice").await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get_document("book.pdf", "alice").await.unwrap().is_none());
        assert!(store.get_document("book.pdf", "bob").await.unwrap().is_some());
        assert_eq!(store.search(&[1.0], "bob", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_document() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store.delete("ghost.pdf", "alice").await.unwrap_err();
        assert_eq!(err.error_code(), "DOCUMENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_and_stats() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .upsert(&record("b.pdf", "alice", "b"), &[passage("b.pdf", "alice", 0, "b", vec![1.0])])
            .await
            .unwrap();
        store
            .upsert(&record("a.pdf", "alice", "a"), &[passage("a.pdf", "alice", 0, "a", vec![1.0])])
            .await
            .unwrap();
        store
            .upsert(&record("c.pdf", "bob", "c"), &[])
            .await
            .unwrap();

        let docs = store.list_documents("alice").await.unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);

        let all = store.stats(None).await.unwrap();
        assert_eq!(all.documents, 3);
        assert_eq!(all.passages, 2);
        assert_eq!(all.owners, 2);
        assert!(all.storage_bytes > 0);

        let bob = store.stats(Some("bob")).await.unwrap();
        assert_eq!(bob.documents, 1);
        assert_eq!(bob.passages, 0);
        assert_eq!(bob.owner.as_deref(), Some("bob"));
    }
}
