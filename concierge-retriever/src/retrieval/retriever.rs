//! Top-k retrieval over the vector index.

use crate::storage::sqlite_store::SqliteStore;
use crate::storage::{Chunk, CombinedStore, DocumentHash};
use anyhow::{Context, Result};
use async_trait::async_trait;
use concierge_embed::EmbeddingProvider;
use std::sync::Arc;

/// Number of chunks handed to the answer prompt.
pub const DEFAULT_TOP_K: usize = 2;

/// A retrieved chunk with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Finds the chunks most relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns at most [`top_k`](Retriever::top_k) chunks, best first.
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>>;

    fn top_k(&self) -> usize;
}

/// Embeds the query and ranks stored chunks by cosine similarity.
///
/// Searches the whole index unless scoped to one document with
/// [`with_document`](VectorRetriever::with_document).
pub struct VectorRetriever {
    store: SqliteStore,
    provider: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    document: Option<DocumentHash>,
}

impl VectorRetriever {
    pub fn new(store: SqliteStore, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            provider,
            top_k: DEFAULT_TOP_K,
            document: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_document(mut self, document_hash: DocumentHash) -> Self {
        self.document = Some(document_hash);
        self
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let embedding = self
            .provider
            .embed_query(query)
            .await
            .context("embedding the retrieval query")?;

        let results = match self.document {
            Some(hash) => {
                self.store
                    .search_document_chunks(hash, embedding, self.top_k, None)
                    .await?
            }
            None => self.store.search_chunks(embedding, self.top_k, None).await?,
        };

        tracing::debug!(
            "Retrieved {} chunks for query {:?} (scores: {:?})",
            results.len(),
            query,
            results.iter().map(|(_, score)| *score).collect::<Vec<_>>()
        );

        Ok(results
            .into_iter()
            .map(|(chunk, score)| ScoredChunk { chunk, score })
            .collect())
    }

    fn top_k(&self) -> usize {
        self.top_k
    }
}
