// Answer module
// Retrieval-augmented answering over the indexed documents

pub mod prompt;


pub use prompt::{PromptConfig, PromptTemplate, RelevancePolicy, format_transcript};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;
use crate::embeddings::Embedder;
use crate::session::Turn;
use crate::vector_store::{SearchMatch, VectorIndex};

pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message sent to a chat completion model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Chat completion backend
pub trait ChatModel: Send + Sync {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Answers a question given the conversation so far
pub trait Answerer: Send + Sync {
    fn answer(&self, question: &str, history: &[Turn]) -> Result<String>;
}

/// Embeds the question, pulls the closest chunks and asks the chat model
pub struct RagAnswerer {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    chat: Arc<dyn ChatModel>,
    template: PromptTemplate,
    top_k: usize,
    fallback_answer: String,
}

impl std::fmt::Debug for RagAnswerer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagAnswerer")
            .field("template", &self.template)
            .field("top_k", &self.top_k)
            .field("fallback_answer", &self.fallback_answer)
            .finish_non_exhaustive()
    }
}

impl RagAnswerer {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chat: Arc<dyn ChatModel>,
        template: PromptTemplate,
    ) -> Self {
        Self {
            embedder,
            index,
            chat,
            template,
            top_k: DEFAULT_TOP_K,
            fallback_answer: prompt::DEFAULT_FALLBACK_ANSWER.to_string(),
        }
    }

    #[inline]
    pub fn from_config(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        chat: Arc<dyn ChatModel>,
        prompt: &PromptConfig,
        top_k: usize,
    ) -> Self {
        Self::new(embedder, index, chat, PromptTemplate::from_config(prompt))
            .with_top_k(top_k)
            .with_fallback_answer(prompt.fallback_answer.clone())
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    #[inline]
    pub fn with_fallback_answer(mut self, fallback_answer: String) -> Self {
        self.fallback_answer = fallback_answer;
        self
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Closest chunks to the question, best first
    #[inline]
    pub fn retrieve(&self, question: &str) -> Result<Vec<SearchMatch>> {
        let vector = self.embedder.embed(question)?;
        let matches = self.index.query(&vector, self.top_k)?;
        debug!(
            "Retrieved {} chunks: {:?}",
            matches.len(),
            matches.iter().map(|m| m.id.as_str()).collect::<Vec<_>>()
        );
        Ok(matches)
    }
}

impl Answerer for RagAnswerer {
    #[inline]
    fn answer(&self, question: &str, history: &[Turn]) -> Result<String> {
        let transcript = format_transcript(history);
        let matches = self.retrieve(question)?;
        let context = build_context(&matches);

        let messages = self.template.render(question, &context, &transcript);
        let answer = self.chat.complete(&messages)?;

        if answer.trim().is_empty() {
            info!("Model returned an empty answer, using fallback");
            return Ok(self.fallback_answer.clone());
        }
        Ok(answer)
    }
}

/// Join the chunk texts with blank lines
#[inline]
pub fn build_context(matches: &[SearchMatch]) -> String {
    matches
        .iter()
        .map(|m| m.metadata.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
