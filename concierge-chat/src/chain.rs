//! History-aware question answering over the retriever.
//!
//! Each call runs, in order: an optional condense call to the model, one
//! retrieval, and one answer call. Nothing is retried. The session only
//! grows when all of these succeed.

use crate::error::{ChatError, Result};
use crate::llm::ChatModel;
use crate::memory::{ConversationTurn, Session, format_history};
use crate::prompt::{answer_prompt, condense_prompt};
use concierge_retriever::{Retriever, ScoredChunk};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Separator placed between retrieved chunks in the answer prompt.
const CONTEXT_SEPARATOR: &str = "\n\n";

pub struct ConversationalRetrievalChain {
    model: Arc<dyn ChatModel>,
    retriever: Arc<dyn Retriever>,
}

impl ConversationalRetrievalChain {
    pub fn new(model: Arc<dyn ChatModel>, retriever: Arc<dyn Retriever>) -> Self {
        Self { model, retriever }
    }

    /// Answers `question`, never failing.
    ///
    /// Any error becomes a reply of the form `Error: <description>` and
    /// leaves `memory` untouched.
    pub async fn answer(&self, question: &str, memory: &mut Session) -> String {
        match self.try_answer(question, memory).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Answering failed: {e}");
                format!("Error: {e}")
            }
        }
    }

    /// Answers `question` and appends the turn to `memory` on success.
    pub async fn try_answer(&self, question: &str, memory: &mut Session) -> Result<String> {
        if question.trim().is_empty() {
            return Err(ChatError::EmptyQuestion);
        }

        let history = format_history(memory.turns());
        let standalone = self.condense(question, &history).await?;

        let hits = self
            .retriever
            .retrieve(&standalone)
            .await
            .map_err(ChatError::Retrieval)?;
        debug!("Using {} chunks as context", hits.len());

        let prompt = answer_prompt(&join_context(&hits), &history, question);
        let answer = self.model.generate(&prompt).await?.trim().to_string();

        memory.push(ConversationTurn::new(question, answer.clone()));
        info!("Answered question (session now has {} turns)", memory.len());
        Ok(answer)
    }

    /// Rewrites a follow-up into a standalone query; first questions pass through.
    async fn condense(&self, question: &str, history: &str) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let condensed = self
            .model
            .generate(&condense_prompt(history, question))
            .await?;
        let condensed = condensed.trim();

        if condensed.is_empty() {
            debug!("Condensed question was empty; retrieving with the original");
            return Ok(question.to_string());
        }
        debug!("Condensed {question:?} into {condensed:?}");
        Ok(condensed.to_string())
    }
}

fn join_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
