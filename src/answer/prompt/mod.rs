
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatRole};
use crate::session::Turn;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const HISTORY_PLACEHOLDER: &str = "{conversation_history}";
pub const INPUT_PLACEHOLDER: &str = "{input}";
pub const TOPICS_PLACEHOLDER: &str = "{topics}";

pub const DEFAULT_FALLBACK_ANSWER: &str =
    "This question is not relevant. Please ask relevant questions.";

const PERMISSIVE_SYSTEM_TEMPLATE: &str = "\
You are an AI assistant that answers questions using context retrieved from a document collection.
Use the context to answer accurately and comprehensively.
Guidelines for answering:
1. If the context contains directly relevant information, give a detailed answer.
2. If the context is only partially relevant, give the best answer it supports and say which aspects you can address.
3. Connect follow-up questions and clarifications to the context even when it is not mentioned explicitly.
4. Consider synonyms, related concepts and implied connections when judging relevance.
5. Use the conversation history to understand follow-up questions and references such as 'it', 'that' or 'this'.
6. If a question builds on the earlier discussion, interpret it in that light.
7. Always answer questions related to: {topics}, or engineering and construction in general.
8. Only respond with 'This question is not relevant. Please ask questions related to the document content.' \
when the question is completely unrelated to those topics (for example cooking recipes, sports scores or entertainment).

Context:
{context}

Conversation history:
{conversation_history}";

const STRICT_SYSTEM_TEMPLATE: &str = "\
You are an AI assistant that answers questions strictly from the context below, \
retrieved from a document collection about {topics}.
Do not use outside knowledge.
If the context does not contain the answer, respond only with \
'This question is not relevant. Please ask questions related to the document content.'
Use the conversation history only to work out what the question refers to.

Context:
{context}

Conversation history:
{conversation_history}";

/// How far the model is told to stray from the retrieved documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevancePolicy {
    /// Best-effort answers for anything near the configured topics
    #[default]
    Permissive,
    /// Answer only what the retrieved context supports
    Strict,
}

/// Prompt settings from the `[prompt]` section of the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub policy: RelevancePolicy,
    pub topics: Vec<String>,
    /// Replaces the policy's built-in system prompt when set
    pub system_template: Option<String>,
    pub human_template: String,
    /// Answer returned when the model produces nothing
    pub fallback_answer: String,
}

impl Default for PromptConfig {
    #[inline]
    fn default() -> Self {
        Self {
            policy: RelevancePolicy::Permissive,
            topics: vec![
                "ASCE (American Society of Civil Engineers)".to_string(),
                "civil engineering".to_string(),
                "canoeing".to_string(),
                "concrete canoe".to_string(),
            ],
            system_template: None,
            human_template: INPUT_PLACEHOLDER.to_string(),
            fallback_answer: DEFAULT_FALLBACK_ANSWER.to_string(),
        }
    }
}

/// System and human prompt templates with the topic list already filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    system: String,
    human: String,
}

impl PromptTemplate {
    #[inline]
    pub fn new(system: impl Into<String>, human: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            human: human.into(),
        }
    }

    #[inline]
    pub fn from_config(config: &PromptConfig) -> Self {
        let base = config
            .system_template
            .as_deref()
            .unwrap_or(match config.policy {
                RelevancePolicy::Permissive => PERMISSIVE_SYSTEM_TEMPLATE,
                RelevancePolicy::Strict => STRICT_SYSTEM_TEMPLATE,
            });

        let topics = config.topics.join(", ");
        Self {
            system: fill(base, &[("topics", &topics)]),
            human: config.human_template.clone(),
        }
    }

    #[inline]
    pub fn system(&self) -> &str {
        &self.system
    }

    /// Render the system + human message pair for one question
    #[inline]
    pub fn render(&self, question: &str, context: &str, transcript: &str) -> Vec<ChatMessage> {
        let values = [
            ("context", context),
            ("conversation_history", transcript),
            ("input", question),
        ];

        vec![
            ChatMessage::new(ChatRole::System, fill(&self.system, &values)),
            ChatMessage::new(ChatRole::User, fill(&self.human, &values)),
        ]
    }
}

/// Format prior turns as a `User: ...` / `Assistant: ...` transcript
#[inline]
pub fn format_transcript(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitute `{name}` placeholders in a single pass. Unknown placeholders and
/// stray braces are kept verbatim, and substituted values are never rescanned.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let closed = after[name_len..].starts_with('}');

        match values.iter().find(|(key, _)| closed && *key == &after[..name_len]) {
            Some((_, value)) => {
                out.push_str(value);
                rest = &after[name_len + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
