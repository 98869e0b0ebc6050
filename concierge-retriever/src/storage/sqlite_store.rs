//! SQLite implementation of the storage traits
//!
//! [`SqliteStore`] adapts [`CorpusIndex`] to the [`ChunkStore`],
//! [`EmbeddingStore`] and [`CombinedStore`] traits. Similarity search is an
//! exhaustive cosine scan in memory; a single corpus stays small enough that
//! no approximate index is needed.

use super::{
    Chunk, ChunkFilter, ChunkId, ChunkMetadata, ChunkStore, CombinedStore, DocumentHash,
    EmbeddingStore,
};
use crate::retrieval::corpus_index::{ChunkRef, CorpusIndex};
use anyhow::{Result, bail};
use async_trait::async_trait;
use half::f16;

/// SQLite-based implementation of the storage traits.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    index: CorpusIndex,
}

impl SqliteStore {
    pub fn new(index: CorpusIndex) -> Self {
        Self { index }
    }

    /// The underlying index, for document-level operations.
    pub fn index(&self) -> &CorpusIndex {
        &self.index
    }

    fn chunk_ref_to_chunk(chunk_ref: ChunkRef) -> Chunk {
        Chunk {
            id: chunk_ref.id,
            document_hash: chunk_ref.document_hash,
            source: chunk_ref.source,
            sequence: chunk_ref.sequence,
            span_start: chunk_ref.span_start,
            span_end: chunk_ref.span_end,
            content: chunk_ref.content,
            embedding: chunk_ref.embedding,
        }
    }

    fn chunk_to_chunk_ref(chunk: Chunk) -> ChunkRef {
        ChunkRef {
            id: chunk.id,
            document_hash: chunk.document_hash,
            source: chunk.source,
            sequence: chunk.sequence,
            span_start: chunk.span_start,
            span_end: chunk.span_end,
            content: chunk.content,
            embedding: chunk.embedding,
        }
    }

    fn metadata(chunk_ref: &ChunkRef) -> Option<ChunkMetadata> {
        chunk_ref.id.map(|id| ChunkMetadata {
            id,
            document_hash: chunk_ref.document_hash,
            source: chunk_ref.source.clone(),
            sequence: chunk_ref.sequence,
            span_start: chunk_ref.span_start,
            span_end: chunk_ref.span_end,
            has_embedding: chunk_ref.embedding.is_some(),
        })
    }

    /// Like [`CombinedStore::search_chunks`], restricted to one document.
    pub async fn search_document_chunks(
        &self,
        document_hash: DocumentHash,
        query: Vec<f16>,
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<(Chunk, f32)>> {
        Ok(self
            .rank(&query, limit, threshold, Some(&document_hash))
            .await?
            .into_iter()
            .map(|(chunk, score)| (Self::chunk_ref_to_chunk(chunk), score))
            .collect())
    }

    /// Scores embedded chunks against `query`, best first.
    async fn rank(
        &self,
        query: &[f16],
        limit: usize,
        threshold: Option<f32>,
        document_hash: Option<&DocumentHash>,
    ) -> Result<Vec<(ChunkRef, f32)>> {
        let candidates = match document_hash {
            Some(hash) => self.index.get_document_chunks_with_embeddings(hash).await?,
            None => self.index.get_all_chunks_with_embeddings().await?,
        };

        let mut scored: Vec<(ChunkRef, f32)> = candidates
            .into_iter()
            .filter_map(|chunk| {
                let score = cosine_similarity(query, chunk.embedding.as_deref()?);
                match threshold {
                    Some(min) if score < min => None,
                    _ => Some((chunk, score)),
                }
            })
            .collect();

        // Stable sort keeps document order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        tracing::debug!("Similarity search kept {} chunks", scored.len());
        Ok(scored)
    }
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn insert_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<ChunkId>> {
        let chunk_refs: Vec<ChunkRef> = chunks.into_iter().map(Self::chunk_to_chunk_ref).collect();
        self.index.insert_chunks(&chunk_refs).await
    }

    async fn get_chunk(&self, id: ChunkId) -> Result<Option<Chunk>> {
        let chunk_ref = self.index.get_chunk_by_id(id).await?;
        Ok(chunk_ref.map(Self::chunk_ref_to_chunk))
    }

    async fn delete_chunks(&self, document_hash: DocumentHash) -> Result<usize> {
        self.index.delete_chunks(&document_hash).await
    }

    async fn list_chunks(&self, filter: ChunkFilter) -> Result<Vec<ChunkMetadata>> {
        let chunks = match filter.document_hash {
            Some(hash) => self.index.get_chunks(&hash).await?,
            None => self.index.get_all_chunks().await?,
        };

        Ok(chunks
            .iter()
            .filter(|chunk| {
                filter
                    .has_embedding
                    .is_none_or(|wanted| chunk.embedding.is_some() == wanted)
            })
            .filter_map(Self::metadata)
            .collect())
    }

    async fn get_document_chunks(&self, document_hash: DocumentHash) -> Result<Vec<Chunk>> {
        let chunk_refs = self.index.get_chunks(&document_hash).await?;
        Ok(chunk_refs
            .into_iter()
            .map(Self::chunk_ref_to_chunk)
            .collect())
    }
}

#[async_trait]
impl EmbeddingStore for SqliteStore {
    async fn store_embeddings(
        &self,
        chunk_ids: Vec<ChunkId>,
        embeddings: Vec<Vec<f16>>,
    ) -> Result<()> {
        if chunk_ids.len() != embeddings.len() {
            bail!(
                "Chunk IDs and embeddings count mismatch: {} ids, {} embeddings",
                chunk_ids.len(),
                embeddings.len()
            );
        }

        for (chunk_id, embedding) in chunk_ids.into_iter().zip(embeddings.iter()) {
            self.index
                .update_chunk_embedding(chunk_id, Some(embedding))
                .await?;
        }

        Ok(())
    }

    async fn search_similar(
        &self,
        query: Vec<f16>,
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<(ChunkId, f32)>> {
        Ok(self
            .rank(&query, limit, threshold, None)
            .await?
            .into_iter()
            .filter_map(|(chunk, score)| chunk.id.map(|id| (id, score)))
            .collect())
    }

    async fn get_embedding(&self, chunk_id: ChunkId) -> Result<Option<Vec<f16>>> {
        let chunk = self.index.get_chunk_by_id(chunk_id).await?;
        Ok(chunk.and_then(|c| c.embedding))
    }
}

#[async_trait]
impl CombinedStore for SqliteStore {
    async fn search_chunks(
        &self,
        query: Vec<f16>,
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<(Chunk, f32)>> {
        Ok(self
            .rank(&query, limit, threshold, None)
            .await?
            .into_iter()
            .map(|(chunk, score)| (Self::chunk_ref_to_chunk(chunk), score))
            .collect())
    }
}

/// Cosine similarity of two f16 vectors; 0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f16], b: &[f16]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot_product = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = x.to_f32();
        let y = y.to_f32();
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let norm_a = norm_a.sqrt();
    let norm_b = norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
