//! Error types for the conversation layer

use std::path::PathBuf;

/// Failure talking to the generation model.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport-level failure (connection refused, timeout, TLS, body decoding)
    #[error("request to the language model failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("language model returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The service answered successfully but produced no usable text
    #[error("malformed language model response: {0}")]
    MalformedResponse(String),
}

/// Error type for assembling and running the assistant.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The API credential is not configured; fatal at startup
    #[error("{var} is not set; add it to the environment or a .env file")]
    MissingCredential { var: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("question is empty")]
    EmptyQuestion,

    #[error(transparent)]
    Model(#[from] LlmError),

    #[error("retrieval failed: {0:#}")]
    Retrieval(#[source] anyhow::Error),

    #[error("building the index failed: {0:#}")]
    Index(#[source] anyhow::Error),

    #[error(transparent)]
    Embed(#[from] concierge_embed::EmbedError),
}

pub type Result<T> = std::result::Result<T, ChatError>;
