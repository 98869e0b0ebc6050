//! # concierge-embed
//!
//! Text embeddings from a hosted embedding model, exposed through an async
//! provider trait so the rest of the workspace never talks HTTP directly.
//!
//! ## Features
//!
//! - **Remote Embeddings**: Calls the Gemini `batchEmbedContents` endpoint
//! - **Task-Aware Vectors**: Corpus passages and search queries are embedded with
//!   their respective retrieval task types
//! - **Batching**: Large corpora are split into requests of at most 100 texts
//! - **Half-Precision**: Vectors are unit-normalized and stored as `f16`
//!
//! ## Quick Start
//!
//! ```no_run
//! use concierge_embed::{EmbedConfig, EmbeddingProvider, GeminiEmbeddingProvider};
//!
//! # async fn example() -> concierge_embed::Result<()> {
//! let provider = GeminiEmbeddingProvider::new(EmbedConfig::new("my-api-key"))?;
//!
//! let texts = vec!["Business hours: 9am-5pm".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Model, endpoint and credential settings
//! - [`provider`]: The [`EmbeddingProvider`] trait and the Gemini implementation
//! - [`error`]: Error types and result handling

pub mod config;
pub mod error;
pub mod provider;

pub use config::EmbedConfig;
pub use error::{EmbedError, Result};
pub use provider::{
    EmbeddingProvider, EmbeddingResult, GeminiEmbeddingProvider, TaskType, normalize_to_f16,
};
