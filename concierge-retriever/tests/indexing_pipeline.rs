//! End-to-end indexing and retrieval with a deterministic in-process embedder.
//!
//! These tests cover:
//! - Building an index from a corpus file
//! - Top-k retrieval ranking the relevant chunk first
//! - Reusing a persistent index for unchanged content
//! - Replacing stale chunks when the corpus changes

use anyhow::Result;
use async_trait::async_trait;
use concierge_embed::{EmbeddingProvider, EmbeddingResult, normalize_to_f16};
use concierge_retriever::{
    CorpusIndex, Indexer, IndexerConfig, Retriever, SqliteStore, VectorRetriever, load_document,
};
use half::f16;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

const DIMENSION: usize = 256;

/// Bag-of-words embedder: each lowercase token bumps one hashed bucket.
#[derive(Default)]
struct WordHashEmbedder {
    document_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl WordHashEmbedder {
    fn vectorize(text: &str) -> Vec<f16> {
        let mut buckets = vec![0.0f32; DIMENSION];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let bucket = token
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
            buckets[bucket as usize % DIMENSION] += 1.0;
        }
        normalize_to_f16(&buckets)
    }
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> concierge_embed::Result<EmbeddingResult> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbeddingResult::new(
            texts.iter().map(|t| Self::vectorize(t)).collect(),
        ))
    }

    async fn embed_query(&self, query: &str) -> concierge_embed::Result<Vec<f16>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vectorize(query))
    }

    fn embedding_dimension(&self) -> usize {
        DIMENSION
    }

    fn provider_name(&self) -> &str {
        "word-hash"
    }
}

const CORPUS: &str = "Welcome to Acme Support.\n\n\
Business hours: 9am-5pm Mon-Fri. We are closed on public holidays.\n\n\
Returns are accepted within 30 days of purchase with a receipt.\n\n\
Shipping is free on orders over $50 within the continental US.";

fn small_chunks() -> IndexerConfig {
    IndexerConfig::default()
        .with_chunk_size(80)
        .with_chunk_overlap(10)
}

#[tokio::test]
async fn test_index_and_retrieve_business_hours() -> Result<()> {
    let temp_dir = tempdir()?;
    let corpus_path = temp_dir.path().join("data.txt");
    tokio::fs::write(&corpus_path, CORPUS).await?;

    let provider = Arc::new(WordHashEmbedder::default());
    let store = SqliteStore::new(CorpusIndex::open_memory().await?);

    let document = load_document(&corpus_path).await?;
    let report = Indexer::new(store.clone(), provider.clone(), small_chunks())
        .build(&document)
        .await?;

    assert!(report.chunks >= 4, "expected several chunks, got {}", report.chunks);
    assert_eq!(report.embedded, report.chunks);
    assert!(!report.reused);
    assert_eq!(provider.document_calls.load(Ordering::SeqCst), 1);

    let stats = store.index().get_stats().await?;
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.chunks, report.chunks);
    assert_eq!(stats.chunks_with_embeddings, report.chunks);

    let retriever = VectorRetriever::new(store, provider.clone());
    assert_eq!(retriever.top_k(), 2);

    let hits = retriever.retrieve("What are your business hours?").await?;
    assert_eq!(hits.len(), 2);
    assert!(hits[0].chunk.content.contains("Business hours"));
    assert!(hits[0].score >= hits[1].score);
    assert_eq!(provider.query_calls.load(Ordering::SeqCst), 1);

    // Spans point back into the corpus.
    let first = &hits[0].chunk;
    assert_eq!(&CORPUS[first.span_start..first.span_end], first.content);
    Ok(())
}

#[tokio::test]
async fn test_persistent_index_reuses_unchanged_corpus() -> Result<()> {
    let temp_dir = tempdir()?;
    let corpus_path = temp_dir.path().join("data.txt");
    let db_path = temp_dir.path().join("index.db");
    tokio::fs::write(&corpus_path, CORPUS).await?;

    let provider = Arc::new(WordHashEmbedder::default());
    let document = load_document(&corpus_path).await?;

    let store = SqliteStore::new(CorpusIndex::open(&db_path).await?);
    let first = Indexer::new(store.clone(), provider.clone(), small_chunks())
        .build(&document)
        .await?;
    store.index().pool().close().await;

    let store = SqliteStore::new(CorpusIndex::open(&db_path).await?);
    let second = Indexer::new(store, provider.clone(), small_chunks())
        .build(&document)
        .await?;

    assert!(second.reused);
    assert_eq!(second.chunks, first.chunks);
    assert_eq!(provider.document_calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_changed_corpus_replaces_old_chunks() -> Result<()> {
    let temp_dir = tempdir()?;
    let corpus_path = temp_dir.path().join("data.txt");
    tokio::fs::write(&corpus_path, CORPUS).await?;

    let provider = Arc::new(WordHashEmbedder::default());
    let store = SqliteStore::new(CorpusIndex::open_memory().await?);
    let indexer = Indexer::new(store.clone(), provider.clone(), small_chunks());

    indexer.build(&load_document(&corpus_path).await?).await?;

    tokio::fs::write(&corpus_path, "Business hours: 8am-8pm every day.").await?;
    let updated = load_document(&corpus_path).await?;
    let report = indexer.build(&updated).await?;

    assert_eq!(report.replaced_versions, 1);
    assert_eq!(report.chunks, 1);

    let stats = store.index().get_stats().await?;
    assert_eq!(stats.documents, 1);
    assert_eq!(stats.chunks, 1);

    let hits = VectorRetriever::new(store, provider)
        .retrieve("business hours")
        .await?;
    assert_eq!(hits.len(), 1);
    assert!(hits[0].chunk.content.contains("8am-8pm"));
    Ok(())
}

#[tokio::test]
async fn test_whitespace_corpus_yields_empty_index() -> Result<()> {
    let temp_dir = tempdir()?;
    let corpus_path = temp_dir.path().join("data.txt");
    tokio::fs::write(&corpus_path, "  \n\n   \n").await?;

    let provider = Arc::new(WordHashEmbedder::default());
    let store = SqliteStore::new(CorpusIndex::open_memory().await?);
    let report = Indexer::new(store.clone(), provider.clone(), IndexerConfig::default())
        .build(&load_document(&corpus_path).await?)
        .await?;

    assert_eq!(report.chunks, 0);
    assert_eq!(provider.document_calls.load(Ordering::SeqCst), 0);

    let hits = VectorRetriever::new(store, provider).retrieve("anything").await?;
    assert!(hits.is_empty());
    Ok(())
}
