//! Process-wide assistant state.
//!
//! [`AppContext`] is built once at startup and is read-only afterwards: the
//! HTTP clients, the vector index and the chain live here. Conversation
//! memory is not part of it; each caller owns its own [`Session`].

use crate::chain::ConversationalRetrievalChain;
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::llm::{ChatModel, GeminiChatModel};
use crate::memory::Session;
use concierge_embed::{EmbeddingProvider, GeminiEmbeddingProvider};
use concierge_retriever::{
    CorpusIndex, IndexReport, IndexStats, Indexer, IndexerConfig, SqliteStore, VectorRetriever,
    load_document,
};
use std::sync::Arc;
use tracing::info;

pub struct AppContext {
    config: ChatConfig,
    chain: ConversationalRetrievalChain,
    store: SqliteStore,
    index_report: IndexReport,
}

impl AppContext {
    /// Validates the configuration, builds the Gemini clients and indexes the corpus.
    ///
    /// Fails before any network call when the credential is missing.
    pub async fn initialize(config: ChatConfig) -> Result<Self> {
        config.validate()?;

        let embedder = Arc::new(GeminiEmbeddingProvider::new(config.embed_config())?);
        let model = Arc::new(GeminiChatModel::new(
            &config.base_url,
            config.model.clone(),
            config.api_key().unwrap_or_default(),
            config.request_timeout(),
        )?);

        Self::from_parts(config, embedder, model).await
    }

    /// Assembles a context around caller-supplied model clients.
    pub async fn from_parts(
        config: ChatConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let index = match &config.index_path {
            Some(path) => CorpusIndex::open(path).await,
            None => CorpusIndex::open_memory().await,
        }
        .map_err(ChatError::Index)?;
        let store = SqliteStore::new(index);

        let document = load_document(&config.corpus_path)
            .await
            .map_err(ChatError::Index)?;
        let indexer_config = IndexerConfig::default()
            .with_chunk_size(config.chunk_size)
            .with_chunk_overlap(config.chunk_overlap)
            .with_embedding_model(config.embedding_model.clone());
        let index_report = Indexer::new(store.clone(), embedder.clone(), indexer_config)
            .build(&document)
            .await
            .map_err(ChatError::Index)?;

        // A shared index file may still hold other corpora; answer from this one only.
        let retriever = VectorRetriever::new(store.clone(), embedder)
            .with_top_k(config.top_k)
            .with_document(document.hash);
        let chain = ConversationalRetrievalChain::new(model.clone(), Arc::new(retriever));

        info!(
            "Assistant ready: {} chunks from {} via {}",
            index_report.chunks,
            index_report.source,
            model.model_name()
        );

        Ok(Self {
            config,
            chain,
            store,
            index_report,
        })
    }

    /// Answers one question; failures come back as `Error: ...` text.
    pub async fn ask(&self, question: &str, session: &mut Session) -> String {
        self.chain.answer(question, session).await
    }

    pub fn chain(&self) -> &ConversationalRetrievalChain {
        &self.chain
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// What happened when the corpus was indexed at startup.
    pub fn index_report(&self) -> &IndexReport {
        &self.index_report
    }

    pub async fn index_stats(&self) -> Result<IndexStats> {
        self.store.index().get_stats().await.map_err(ChatError::Index)
    }
}
