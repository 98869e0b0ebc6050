//! concierge-retriever: corpus indexing and similarity retrieval
//!
//! Loads a single corpus document, splits it into overlapping chunks, embeds
//! each chunk through a [`concierge_embed::EmbeddingProvider`] and keeps the
//! vectors in SQLite for top-k cosine retrieval.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: Loading, indexing and querying the corpus
//! - **[`storage`]**: Storage traits with the SQLite implementation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use concierge_retriever::retrieval::{
//!     corpus_index::CorpusIndex,
//!     indexer::{Indexer, IndexerConfig},
//!     loader::load_document,
//!     retriever::{Retriever, VectorRetriever},
//! };
//! use concierge_retriever::storage::sqlite_store::SqliteStore;
//! use concierge_embed::{EmbedConfig, GeminiEmbeddingProvider};
//! use std::{path::Path, sync::Arc};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = Arc::new(GeminiEmbeddingProvider::new(EmbedConfig::new("my-api-key"))?);
//! let store = SqliteStore::new(CorpusIndex::open_memory().await?);
//!
//! let document = load_document(Path::new("data.txt")).await?;
//! Indexer::new(store.clone(), provider.clone(), IndexerConfig::default())
//!     .build(&document)
//!     .await?;
//!
//! let retriever = VectorRetriever::new(store, provider);
//! for hit in retriever.retrieve("What are your business hours?").await? {
//!     println!("{:.3} {}", hit.score, hit.chunk.content);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Corpus file → Loader → Chunker → Embeddings → SQLite (CorpusIndex)
//!                                                  ↓
//!                         Query → Embedding → VectorRetriever → top-k chunks
//! ```

pub mod retrieval;
pub mod storage;

pub use retrieval::corpus_index::{CorpusIndex, IndexStats};
pub use retrieval::indexer::{IndexReport, Indexer, IndexerConfig};
pub use retrieval::loader::{Document, load_document};
pub use retrieval::retriever::{DEFAULT_TOP_K, Retriever, ScoredChunk, VectorRetriever};
pub use storage::sqlite_store::SqliteStore;
