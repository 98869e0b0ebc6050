//! Core SQLite database operations for corpus and chunk storage.
//!
//! This module is the data layer underneath the vector index. It stores the
//! indexed corpus documents, the chunks cut from them, and each chunk's
//! embedding as a little-endian f16 blob.
//!
//! ## Database Schema
//!
//! ```sql
//! -- Documents table: one row per indexed corpus version
//! CREATE TABLE documents (
//!     hash BLOB PRIMARY KEY,           -- blake3 hash of the content (32 bytes)
//!     source TEXT NOT NULL,            -- path the corpus was loaded from
//!     size INTEGER NOT NULL,           -- content length in bytes
//!     indexed_at TEXT NOT NULL,        -- RFC 3339 timestamp
//!     settings TEXT NOT NULL           -- chunking/embedding settings the chunks were built with
//! );
//!
//! -- Chunks table: overlapping windows of a document with embeddings
//! CREATE TABLE chunks (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     document_hash BLOB REFERENCES documents(hash) ON DELETE CASCADE,
//!     source TEXT,                     -- denormalized for display
//!     sequence INTEGER,                -- position of the chunk in the document
//!     span_start INTEGER,              -- byte offset of the first character
//!     span_end INTEGER,                -- byte offset one past the last character
//!     content TEXT,
//!     embedding BLOB                   -- f16 embedding vector (optional)
//! );
//! ```
//!
//! A persistent index is opened with [`CorpusIndex::open`]; the default
//! in-process index uses [`CorpusIndex::open_memory`], which pins the pool to
//! a single connection so every query sees the same in-memory database.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use half::f16;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// Blake3 hash identifying one version of a corpus document.
pub type DocumentHash = [u8; 32];

/// Reference to a corpus document stored in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Path the document was loaded from
    pub source: String,
    /// Blake3 hash of the document content
    pub hash: DocumentHash,
    /// Content length in bytes
    pub size: usize,
}

/// A document row as recorded in the index.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub source: String,
    pub hash: DocumentHash,
    pub size: usize,
    pub indexed_at: DateTime<Utc>,
    /// Empty until a build over this document completes
    pub settings: String,
}

/// Reference to a text chunk stored in the index database.
///
/// `id` is `None` for chunks that have not been inserted yet. The span is a
/// byte range into the document the chunk was cut from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRef {
    pub id: Option<i64>,
    pub document_hash: DocumentHash,
    pub source: String,
    pub sequence: usize,
    pub span_start: usize,
    pub span_end: usize,
    pub content: String,
    pub embedding: Option<Vec<f16>>,
}

/// Counts describing the contents of an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub chunks_with_embeddings: usize,
}

/// SQLite-based document and chunk index.
#[derive(Clone, Debug)]
pub struct CorpusIndex {
    pool: SqlitePool,
}

const CHUNK_COLUMNS: &str =
    "id, document_hash, source, sequence, span_start, span_end, content, embedding";

impl CorpusIndex {
    /// Opens (creating if needed) a persistent index at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true),
        )
        .await
        .with_context(|| format!("opening index database {}", db_path.display()))?;

        tracing::debug!("Opened corpus index at {}", db_path.display());
        Self::new_with_pool(pool).await
    }

    /// Opens an in-memory index that lives as long as this value (and its clones).
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                hash BLOB PRIMARY KEY,
                source TEXT NOT NULL,
                size INTEGER NOT NULL,
                indexed_at TEXT NOT NULL,
                settings TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_hash BLOB NOT NULL,
                source TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                span_start INTEGER NOT NULL,
                span_end INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB,
                CONSTRAINT unique_chunk UNIQUE(document_hash, sequence),
                FOREIGN KEY (document_hash) REFERENCES documents(hash) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_hash)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Direct access to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts a document row, refreshing its source and timestamp if it already exists.
    pub async fn upsert_document(&self, document: &DocumentRef) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (hash, source, size, indexed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(hash) DO UPDATE SET
                source = excluded.source,
                size = excluded.size,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&document.hash[..])
        .bind(&document.source)
        .bind(document.size as i64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records the settings a completed build used for this document.
    pub async fn set_document_settings(&self, hash: &DocumentHash, settings: &str) -> Result<()> {
        let result = sqlx::query("UPDATE documents SET settings = ?1 WHERE hash = ?2")
            .bind(settings)
            .bind(&hash[..])
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("No document with hash {}", hex::encode(hash));
        }
        Ok(())
    }

    /// Settings of a stored document, or `None` when the document is absent.
    pub async fn document_settings(&self, hash: &DocumentHash) -> Result<Option<String>> {
        let settings: Option<String> =
            sqlx::query_scalar("SELECT settings FROM documents WHERE hash = ?1")
                .bind(&hash[..])
                .fetch_optional(&self.pool)
                .await?;
        Ok(settings)
    }

    pub async fn document_exists(&self, hash: &DocumentHash) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE hash = ?1")
            .bind(&hash[..])
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// All documents, most recently indexed first.
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            "SELECT hash, source, size, indexed_at, settings FROM documents ORDER BY indexed_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let size: i64 = row.get("size");
                Ok(DocumentRecord {
                    hash: hash_from_bytes(row.get("hash"))?,
                    source: row.get("source"),
                    size: size as usize,
                    indexed_at: row.get("indexed_at"),
                    settings: row.get("settings"),
                })
            })
            .collect()
    }

    /// Removes every other version of the document loaded from `source`,
    /// together with its chunks. Returns the number of documents removed.
    pub async fn delete_other_versions(&self, source: &str, keep: &DocumentHash) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM chunks WHERE document_hash IN
             (SELECT hash FROM documents WHERE source = ?1 AND hash != ?2)",
        )
        .bind(source)
        .bind(&keep[..])
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM documents WHERE source = ?1 AND hash != ?2")
            .bind(source)
            .bind(&keep[..])
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() as usize)
    }

    /// Inserts chunks in one transaction and returns their new IDs in input order.
    pub async fn insert_chunks(&self, chunks: &[ChunkRef]) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let embedding_bytes = chunk
                .embedding
                .as_ref()
                .map(|e| bytemuck::cast_slice::<f16, u8>(e));

            let result = sqlx::query(
                r#"
                INSERT INTO chunks (document_hash, source, sequence, span_start, span_end, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&chunk.document_hash[..])
            .bind(&chunk.source)
            .bind(chunk.sequence as i64)
            .bind(chunk.span_start as i64)
            .bind(chunk.span_end as i64)
            .bind(&chunk.content)
            .bind(embedding_bytes)
            .execute(&mut *tx)
            .await?;

            ids.push(result.last_insert_rowid());
        }

        tx.commit().await?;
        Ok(ids)
    }

    /// Get chunks for a document, in sequence order
    pub async fn get_chunks(&self, hash: &DocumentHash) -> Result<Vec<ChunkRef>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks WHERE document_hash = ?1 ORDER BY sequence"
        ))
        .bind(&hash[..])
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chunk).collect()
    }

    /// Get every chunk in the index
    pub async fn get_all_chunks(&self) -> Result<Vec<ChunkRef>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks ORDER BY source, sequence"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chunk).collect()
    }

    /// Get all chunks with embeddings
    pub async fn get_all_chunks_with_embeddings(&self) -> Result<Vec<ChunkRef>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks WHERE embedding IS NOT NULL ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chunk).collect()
    }

    /// Get the embedded chunks of one document
    pub async fn get_document_chunks_with_embeddings(
        &self,
        hash: &DocumentHash,
    ) -> Result<Vec<ChunkRef>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHUNK_COLUMNS} FROM chunks
             WHERE document_hash = ?1 AND embedding IS NOT NULL ORDER BY id"
        ))
        .bind(&hash[..])
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chunk).collect()
    }

    /// Get a chunk by ID
    pub async fn get_chunk_by_id(&self, id: i64) -> Result<Option<ChunkRef>> {
        let row = sqlx::query(&format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_chunk).transpose()
    }

    /// Update a chunk's embedding by ID
    pub async fn update_chunk_embedding(&self, id: i64, embedding: Option<&[f16]>) -> Result<()> {
        let embedding_bytes = embedding.map(bytemuck::cast_slice::<f16, u8>);

        let result = sqlx::query("UPDATE chunks SET embedding = ?1 WHERE id = ?2")
            .bind(embedding_bytes)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            bail!("No chunk with id {id}");
        }
        Ok(())
    }

    /// Delete chunks for a document
    pub async fn delete_chunks(&self, hash: &DocumentHash) -> Result<usize> {
        let result = sqlx::query("DELETE FROM chunks WHERE document_hash = ?1")
            .bind(&hash[..])
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    /// Returns `(chunks, chunks_with_embeddings)` for one document.
    pub async fn document_chunk_counts(&self, hash: &DocumentHash) -> Result<(usize, usize)> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COUNT(embedding) AS embedded
             FROM chunks WHERE document_hash = ?1",
        )
        .bind(&hash[..])
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        let embedded: i64 = row.get("embedded");
        Ok((total as usize, embedded as usize))
    }

    pub async fn get_stats(&self) -> Result<IndexStats> {
        let documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        let chunks_with_embeddings: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(IndexStats {
            documents: documents as usize,
            chunks: chunks as usize,
            chunks_with_embeddings: chunks_with_embeddings as usize,
        })
    }
}

fn hash_from_bytes(bytes: Vec<u8>) -> Result<DocumentHash> {
    DocumentHash::try_from(bytes.as_slice())
        .map_err(|_| anyhow::anyhow!("stored document hash has {} bytes, expected 32", bytes.len()))
}

fn embedding_from_bytes(bytes: &[u8]) -> Result<Vec<f16>> {
    if bytes.len() % std::mem::size_of::<f16>() != 0 {
        bail!("stored embedding has odd length {}", bytes.len());
    }
    // Blob buffers carry no alignment guarantee, so copy rather than cast in place.
    Ok(bytemuck::pod_collect_to_vec::<u8, f16>(bytes))
}

fn row_to_chunk(row: &SqliteRow) -> Result<ChunkRef> {
    let id: i64 = row.get("id");
    let sequence: i64 = row.get("sequence");
    let span_start: i64 = row.get("span_start");
    let span_end: i64 = row.get("span_end");
    let embedding_bytes: Option<Vec<u8>> = row.get("embedding");

    Ok(ChunkRef {
        id: Some(id),
        document_hash: hash_from_bytes(row.get("document_hash"))?,
        source: row.get("source"),
        sequence: sequence as usize,
        span_start: span_start as usize,
        span_end: span_end as usize,
        content: row.get("content"),
        embedding: embedding_bytes
            .as_deref()
            .map(embedding_from_bytes)
            .transpose()?,
    })
}
