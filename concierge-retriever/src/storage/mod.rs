//! Storage abstraction layer for concierge-retriever
//!
//! Trait-based access to stored chunks and their embeddings, separating the
//! retrieval logic from the SQLite tables underneath.
//!
//! ## Key Components
//!
//! - **ChunkStore**: Text storage and retrieval operations
//! - **EmbeddingStore**: Vector similarity search operations
//! - **CombinedStore**: Unified interface combining both stores
//!
//! ```text
//! ChunkStore ─┐
//!             ├─ CombinedStore ── SqliteStore (over CorpusIndex)
//! EmbeddingStore ─┘
//! ```

use anyhow::Result;
use async_trait::async_trait;
use half::f16;

pub mod sqlite_store;

pub use crate::retrieval::corpus_index::DocumentHash;

/// Database ID for a text chunk.
pub type ChunkId = i64;

/// Corpus chunk with content and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: Option<ChunkId>,
    pub document_hash: DocumentHash,
    pub source: String,
    pub sequence: usize,
    pub span_start: usize,
    pub span_end: usize,
    pub content: String,
    pub embedding: Option<Vec<f16>>,
}

/// Query filter for chunk listings.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub document_hash: Option<DocumentHash>,
    pub has_embedding: Option<bool>,
}

/// Chunk metadata without content.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkMetadata {
    pub id: ChunkId,
    #[serde(serialize_with = "serialize_hash")]
    pub document_hash: DocumentHash,
    pub source: String,
    pub sequence: usize,
    pub span_start: usize,
    pub span_end: usize,
    pub has_embedding: bool,
}

fn serialize_hash<S: serde::Serializer>(hash: &DocumentHash, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(hash))
}

/// Text storage operations for corpus chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert new chunks and return their IDs
    async fn insert_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<ChunkId>>;

    /// Get a specific chunk by ID
    async fn get_chunk(&self, id: ChunkId) -> Result<Option<Chunk>>;

    /// Delete chunks for a specific document
    async fn delete_chunks(&self, document_hash: DocumentHash) -> Result<usize>;

    /// List chunks matching filter criteria
    async fn list_chunks(&self, filter: ChunkFilter) -> Result<Vec<ChunkMetadata>>;

    /// Get all chunks for a document, in sequence order
    async fn get_document_chunks(&self, document_hash: DocumentHash) -> Result<Vec<Chunk>>;
}

/// Vector similarity search operations.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Store embeddings for chunks
    async fn store_embeddings(&self, chunk_ids: Vec<ChunkId>, embeddings: Vec<Vec<f16>>)
    -> Result<()>;

    /// Search for similar chunks using cosine similarity, best first
    async fn search_similar(
        &self,
        query: Vec<f16>,
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<(ChunkId, f32)>>;

    /// Get embedding for a specific chunk
    async fn get_embedding(&self, chunk_id: ChunkId) -> Result<Option<Vec<f16>>>;
}

/// Unified store combining text and vector operations.
#[async_trait]
pub trait CombinedStore: ChunkStore + EmbeddingStore + Send + Sync {
    /// Search for similar chunks and return full chunk data
    async fn search_chunks(
        &self,
        query: Vec<f16>,
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<(Chunk, f32)>>;
}
