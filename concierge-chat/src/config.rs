//! Assistant configuration.
//!
//! Settings come from built-in defaults, optionally overridden by a TOML
//! file. The API credential is never read from the file; it comes from the
//! `GOOGLE_API_KEY` environment variable (a `.env` file is loaded by the
//! binary before this runs).

use crate::error::{ChatError, Result};
use concierge_embed::EmbedConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";

#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    /// Generation model used for both condensing and answering
    pub model: String,
    /// Embedding model for corpus chunks and queries
    pub embedding_model: String,
    /// Base URL of the Gemini REST API
    pub base_url: String,
    /// Corpus file the assistant answers from
    pub corpus_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Per-request HTTP timeout, in seconds
    pub request_timeout_secs: u64,
    /// Persistent index file; the index is kept in memory when unset
    pub index_path: Option<PathBuf>,
    #[serde(skip)]
    api_key: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: concierge_embed::config::DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: concierge_embed::config::DEFAULT_BASE_URL.to_string(),
            corpus_path: PathBuf::from("data.txt"),
            chunk_size: 1000,
            chunk_overlap: 100,
            top_k: concierge_retriever::DEFAULT_TOP_K,
            request_timeout_secs: 60,
            index_path: None,
            api_key: None,
        }
    }
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("base_url", &self.base_url)
            .field("corpus_path", &self.corpus_path)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("top_k", &self.top_k)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("index_path", &self.index_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ChatConfig {
    /// Reads settings from a TOML file; keys that are absent keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ChatError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ChatConfig =
            toml::from_str(&content).map_err(|source| ChatError::ConfigFile {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults or the given file, then the credential from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_api_key_from_env())
    }

    /// Takes the credential from [`API_KEY_ENV`] when it is set.
    pub fn with_api_key_from_env(self) -> Self {
        match std::env::var(API_KEY_ENV) {
            Ok(key) => self.with_api_key(key),
            Err(_) => self,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = path.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// The credential, if one is non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Checks everything that must hold before any network call is made.
    pub fn validate(&self) -> Result<()> {
        if self.api_key().is_none() {
            return Err(ChatError::MissingCredential {
                var: API_KEY_ENV.to_string(),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ChatError::InvalidConfig("model is empty".to_string()));
        }
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(ChatError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(ChatError::InvalidConfig("top_k must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ChatError::InvalidConfig(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Embedding settings derived from this configuration.
    pub fn embed_config(&self) -> EmbedConfig {
        EmbedConfig::new(self.api_key().unwrap_or_default())
            .with_model(self.embedding_model.clone())
            .with_base_url(self.base_url.clone())
            .with_timeout(self.request_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.embedding_model, "models/embedding-001");
        assert_eq!(config.corpus_path, PathBuf::from("data.txt"));
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.top_k, 2);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert!(config.index_path.is_none());
    }

    #[test]
    fn test_missing_credential_fails_validation() {
        let err = ChatConfig::default().validate().unwrap_err();
        assert!(matches!(err, ChatError::MissingCredential { ref var } if var == "GOOGLE_API_KEY"));

        let blank = ChatConfig::default().with_api_key("   ");
        assert!(blank.api_key().is_none());
        assert!(blank.validate().is_err());

        assert!(ChatConfig::default().with_api_key("key").validate().is_ok());
    }

    #[test]
    fn test_invalid_settings_fail_validation() {
        let mut config = ChatConfig::default().with_api_key("key");
        config.chunk_overlap = 1000;
        assert!(matches!(config.validate(), Err(ChatError::InvalidConfig(_))));

        let mut config = ChatConfig::default().with_api_key("key");
        config.top_k = 0;
        assert!(matches!(config.validate(), Err(ChatError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concierge.toml");
        std::fs::write(
            &path,
            r#"
model = "gemini-2.0-flash"
corpus_path = "faq.md"
top_k = 4
index_path = ".concierge/index.db"
"#,
        )
        .unwrap();

        let config = ChatConfig::from_file(&path).unwrap();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.corpus_path, PathBuf::from("faq.md"));
        assert_eq!(config.top_k, 4);
        assert_eq!(config.index_path, Some(PathBuf::from(".concierge/index.db")));
        assert_eq!(config.chunk_size, 1000);
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempdir().unwrap();

        let missing = ChatConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ChatError::Io { .. }));

        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "api_key = \"from-file\"\n").unwrap();
        let err = ChatConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ChatError::ConfigFile { .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", ChatConfig::default().with_api_key("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_embed_config_carries_settings() {
        let config = ChatConfig::default()
            .with_api_key("key")
            .with_base_url("http://localhost:9999/")
            .with_timeout(Duration::from_secs(5));
        let embed = config.embed_config();
        assert_eq!(embed.api_key, "key");
        assert_eq!(embed.base_url, "http://localhost:9999");
        assert_eq!(embed.request_timeout, Duration::from_secs(5));
        assert!(embed.validate().is_ok());
    }
}
