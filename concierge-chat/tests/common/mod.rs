//! Deterministic stand-ins for the embedding service and the generation model.

#![allow(dead_code)]

use async_trait::async_trait;
use concierge_chat::{ChatConfig, ChatModel, LlmError};
use concierge_embed::{EmbeddingProvider, EmbeddingResult, normalize_to_f16};
use half::f16;
use std::path::Path;
use std::sync::Mutex;

const BUCKETS: usize = 1024;

pub const CORPUS: &str = "Welcome to Acme Support. We help with orders, returns and shipping.\n\n\
Business hours: 9am-5pm Mon-Fri. We are closed on weekends and public holidays.\n\n\
Returns are accepted within 30 days of purchase with a receipt.\n\n\
Shipping is free on orders over $50 within the continental US.";

/// Bag-of-words embedder that remembers every query it embeds.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub queries: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    fn vectorize(text: &str) -> Vec<f16> {
        let mut buckets = vec![0.0f32; BUCKETS];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
        {
            let hash = token
                .to_lowercase()
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
            buckets[hash as usize % BUCKETS] += 1.0;
        }
        normalize_to_f16(&buckets)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> concierge_embed::Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(
            texts.iter().map(|t| Self::vectorize(t)).collect(),
        ))
    }

    async fn embed_query(&self, query: &str) -> concierge_embed::Result<Vec<f16>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(Self::vectorize(query))
    }

    fn embedding_dimension(&self) -> usize {
        BUCKETS
    }

    fn provider_name(&self) -> &str {
        "keyword"
    }
}

/// Model that condenses by prefixing the previous question and answers by
/// repeating the context it was given.
#[derive(Default)]
pub struct ContextEchoModel {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatModel for ContextEchoModel {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(follow_up) = section(prompt, "Follow Up Input: ", "\nStandalone question:") {
            let previous = prompt
                .lines()
                .filter_map(|line| line.strip_prefix("Human: "))
                .last()
                .unwrap_or_default();
            return Ok(format!("{previous} {follow_up}"));
        }

        let context = section(prompt, "make up an answer.\n\n", "\n\nChat History:")
            .unwrap_or_default();
        Ok(format!("From our records: {context}"))
    }

    fn model_name(&self) -> &str {
        "context-echo"
    }
}

fn section<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let to = text[from..].find(end)? + from;
    Some(&text[from..to])
}

/// Writes the corpus into `dir` and returns a config pointing at it.
pub fn config_with_corpus(dir: &Path) -> ChatConfig {
    let corpus = dir.join("data.txt");
    std::fs::write(&corpus, CORPUS).unwrap();

    let mut config = ChatConfig::default()
        .with_api_key("test-key")
        .with_corpus_path(corpus);
    config.chunk_size = 120;
    config.chunk_overlap = 10;
    config
}
