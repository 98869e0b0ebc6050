//! Configuration for the remote embedding model

use crate::error::{EmbedError, Result};
use std::time::Duration;

/// Default base URL of the Gemini REST API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";

/// Largest number of texts the service accepts in one batch request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Configuration for the embedding provider
#[derive(Clone)]
pub struct EmbedConfig {
    /// Name of the embedding model, with or without the `models/` prefix
    pub model_name: String,
    /// Base URL of the API, without a trailing slash
    pub base_url: String,
    /// API credential sent with every request
    pub api_key: String,
    /// Maximum number of texts per request
    pub batch_size: usize,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for EmbedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedConfig")
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("batch_size", &self.batch_size)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl EmbedConfig {
    /// Create a configuration for the default model with the given credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            model_name: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            batch_size: MAX_BATCH_SIZE,
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Set the embedding model (builder style)
    pub fn with_model<S: Into<String>>(self, model_name: S) -> Self {
        Self {
            model_name: model_name.into(),
            ..self
        }
    }

    /// Set the API base URL (builder style)
    pub fn with_base_url<S: Into<String>>(self, base_url: S) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..self
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set the per-request timeout (builder style)
    pub fn with_timeout(self, request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            ..self
        }
    }

    /// Model resource name as the API expects it (`models/<name>`).
    pub fn model_resource(&self) -> String {
        if self.model_name.starts_with("models/") {
            self.model_name.clone()
        } else {
            format!("models/{}", self.model_name)
        }
    }

    /// Full URL of the batch embedding endpoint.
    pub fn batch_endpoint(&self) -> String {
        format!(
            "{}/{}:batchEmbedContents",
            self.base_url.trim_end_matches('/'),
            self.model_resource()
        )
    }

    /// Validate the configuration before any request is made
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(EmbedError::MissingCredential);
        }
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::invalid_config("model name is empty"));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(EmbedError::invalid_config(format!(
                "batch size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }

        tracing::debug!("Embedding configuration valid for: {}", self.model_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = EmbedConfig::new("test-key");

        assert_eq!(config.model_name, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.batch_size, MAX_BATCH_SIZE);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_methods() {
        let config = EmbedConfig::new("test-key")
            .with_model("text-embedding-004")
            .with_base_url("http://localhost:8080/v1beta/")
            .with_batch_size(16)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.batch_size, 16);
        assert_eq!(config.base_url, "http://localhost:8080/v1beta");
        assert_eq!(config.model_resource(), "models/text-embedding-004");
        assert_eq!(
            config.batch_endpoint(),
            "http://localhost:8080/v1beta/models/text-embedding-004:batchEmbedContents"
        );
    }

    #[test]
    fn test_model_resource_keeps_prefix() {
        let config = EmbedConfig::new("k");
        assert_eq!(config.model_resource(), "models/embedding-001");
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(matches!(
            EmbedConfig::new("   ").validate(),
            Err(EmbedError::MissingCredential)
        ));
        assert!(matches!(
            EmbedConfig::new("k").with_batch_size(0).validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));
        assert!(matches!(
            EmbedConfig::new("k").with_batch_size(101).validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));
        assert!(matches!(
            EmbedConfig::new("k").with_model("").validate(),
            Err(EmbedError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", EmbedConfig::new("super-secret"));
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
