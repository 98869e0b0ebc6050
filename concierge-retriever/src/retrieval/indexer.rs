//! Building the vector index for a corpus document.
//!
//! The index is built once, at process start: the document is chunked,
//! every chunk is embedded as a retrieval document, and chunks are stored
//! together with their vectors. When a persistent index already holds a
//! fully embedded copy of the same content, built with the same chunking
//! parameters and embedding model, that copy is reused; anything else is
//! rebuilt, and chunks left from earlier versions of the corpus are replaced.

use super::loader::Document;
use crate::storage::sqlite_store::SqliteStore;
use crate::storage::{Chunk, ChunkStore};
use anyhow::{Context, Result, bail};
use concierge_context::text::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, create_builder_for_path};
use concierge_embed::EmbeddingProvider;
use concierge_embed::config::DEFAULT_EMBEDDING_MODEL;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Chunking parameters for the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Model the stored vectors come from
    pub embedding_model: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl IndexerConfig {
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Identifies chunks built under these settings by `provider`.
    pub fn fingerprint(&self, provider: &str) -> String {
        format!(
            "{provider}:{} size={} overlap={}",
            self.embedding_model, self.chunk_size, self.chunk_overlap
        )
    }
}

/// Outcome of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IndexReport {
    pub source: String,
    /// Hex-encoded content hash
    pub document_hash: String,
    pub chunks: usize,
    pub embedded: usize,
    /// True when an existing, fully embedded copy was kept as-is
    pub reused: bool,
    /// Earlier versions of the same corpus file dropped from the index
    pub replaced_versions: usize,
}

/// Chunks, embeds and stores corpus documents.
pub struct Indexer {
    store: SqliteStore,
    provider: Arc<dyn EmbeddingProvider>,
    config: IndexerConfig,
}

impl Indexer {
    pub fn new(store: SqliteStore, provider: Arc<dyn EmbeddingProvider>, config: IndexerConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// Indexes `document`, reusing a complete earlier run over identical
    /// content and settings.
    pub async fn build(&self, document: &Document) -> Result<IndexReport> {
        let start = Instant::now();
        let index = self.store.index();
        let fingerprint = self.config.fingerprint(self.provider.provider_name());

        let stored_settings = index.document_settings(&document.hash).await?;
        let (existing, existing_embedded) = index.document_chunk_counts(&document.hash).await?;
        let settings_match = stored_settings.as_deref() == Some(fingerprint.as_str());
        if settings_match && existing > 0 && existing == existing_embedded {
            info!(
                "Reusing {} indexed chunks for {} (unchanged content)",
                existing, document.source
            );
            return Ok(IndexReport {
                source: document.source.clone(),
                document_hash: document.hash_hex(),
                chunks: existing,
                embedded: existing_embedded,
                reused: true,
                replaced_versions: 0,
            });
        }
        if let Some(previous) = stored_settings.filter(|s| !s.is_empty() && !settings_match) {
            info!(
                "Rebuilding {}: settings changed from {previous:?} to {fingerprint:?}",
                document.source
            );
        }

        let replaced_versions = index
            .delete_other_versions(&document.source, &document.hash)
            .await?;
        if replaced_versions > 0 {
            info!(
                "Discarded {} earlier version(s) of {}",
                replaced_versions, document.source
            );
        }
        // A previous run may have stopped halfway through this same content.
        self.store.delete_chunks(document.hash).await?;
        index.upsert_document(&document.to_document_ref()).await?;

        let builder = create_builder_for_path(
            Path::new(&document.source),
            self.config.chunk_size,
            self.config.chunk_overlap,
        )?;
        let text_chunks = builder.get_chunks(&document.content);
        debug!("Split {} into {} chunks", document.source, text_chunks.len());

        if text_chunks.is_empty() {
            warn!("{} produced no chunks; the index is empty", document.source);
            index.set_document_settings(&document.hash, &fingerprint).await?;
            return Ok(IndexReport {
                source: document.source.clone(),
                document_hash: document.hash_hex(),
                chunks: 0,
                embedded: 0,
                reused: false,
                replaced_versions,
            });
        }

        let texts: Vec<String> = text_chunks.iter().map(|c| c.chunk_text.clone()).collect();
        let embeddings = self
            .provider
            .embed_texts(&texts)
            .await
            .with_context(|| format!("embedding chunks of {}", document.source))?;

        if embeddings.len() != text_chunks.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks",
                embeddings.len(),
                text_chunks.len()
            );
        }

        let chunks: Vec<Chunk> = text_chunks
            .into_iter()
            .zip(embeddings.embeddings)
            .map(|(text_chunk, embedding)| Chunk {
                id: None,
                document_hash: document.hash,
                source: document.source.clone(),
                sequence: text_chunk.sequence,
                span_start: text_chunk.span.start,
                span_end: text_chunk.span.end,
                content: text_chunk.chunk_text,
                embedding: Some(embedding),
            })
            .collect();

        let ids = self.store.insert_chunks(chunks).await?;
        index.set_document_settings(&document.hash, &fingerprint).await?;

        info!(
            "Indexed {} chunks of {} with {} in {:?}",
            ids.len(),
            document.source,
            self.provider.provider_name(),
            start.elapsed()
        );

        Ok(IndexReport {
            source: document.source.clone(),
            document_hash: document.hash_hex(),
            chunks: ids.len(),
            embedded: ids.len(),
            reused: false,
            replaced_versions,
        })
    }
}
