use crate::embeddings::Embedder;
use crate::error::QaError;
use crate::llm::{GenerationOptions, LanguageModel};
use crate::models::{Answer, ScoredChunk};
use crate::traits::VectorIndex;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_TOP_K: usize = 10;

pub const NO_ANSWER_REPLY: &str =
    "Sorry, I don't have specific information about that in my knowledge base.";
pub const GENERIC_ERROR_REPLY: &str =
    "An error occurred while processing the question. Please try again.";
pub const CONNECTIVITY_REPLY: &str =
    "Connection issue or invalid API key. Please try again later or check your configuration.";

const PROMPT_HEADER: &str = "\
You are a helpful internal assistant for the company's QA team.
Answer the user's question using only the context below.
If the context does not contain the answer, reply exactly with: ";

const PROMPT_RULES: &str = "\
Keep answers concise, accurate and to the point. Do not use information from outside the context.";

/// Retrieval and generation settings applied to every question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerSettings {
    pub top_k: usize,
    pub generation: GenerationOptions,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            generation: GenerationOptions::default(),
        }
    }
}

/// Answers questions from a built index: embed, retrieve, prompt, generate.
pub struct Answerer<E, L, I>
where
    E: Embedder + ?Sized,
    L: LanguageModel + ?Sized,
    I: VectorIndex,
{
    embedder: Arc<E>,
    model: Arc<L>,
    index: I,
    settings: AnswerSettings,
}

impl<E, L, I> Answerer<E, L, I>
where
    E: Embedder + ?Sized,
    L: LanguageModel + ?Sized,
    I: VectorIndex,
{
    pub fn new(embedder: Arc<E>, model: Arc<L>, index: I, settings: AnswerSettings) -> Self {
        Self {
            embedder,
            model,
            index,
            settings,
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn settings(&self) -> AnswerSettings {
        self.settings
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>, QaError> {
        let query_vector = self.embedder.embed_query(question).await?;
        self.index.search(&query_vector, self.settings.top_k)
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, QaError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::EmptyQuestion);
        }

        let sources = self.retrieve(question).await?;
        debug!(retrieved = sources.len(), "context retrieved");

        let prompt = render_prompt(&sources, question);
        let reply = self
            .model
            .generate(&prompt, self.settings.generation)
            .await?;

        let text = normalize_reply(&reply);
        let grounded = text != NO_ANSWER_REPLY;
        info!(sources = sources.len(), grounded, "question answered");

        Ok(Answer { text, sources })
    }
}

pub fn render_prompt(sources: &[ScoredChunk], question: &str) -> String {
    let context = sources
        .iter()
        .map(|hit| hit.chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{PROMPT_HEADER}'{NO_ANSWER_REPLY}'\n{PROMPT_RULES}\n\nContext:\n{context}\n\nQuestion: {question}\n"
    )
}

/// Trims the reply and maps quoted variants of the fallback phrase to the exact phrase.
fn normalize_reply(reply: &str) -> String {
    let trimmed = reply.trim();
    let unquoted = trimmed.trim_matches(|c| c == '\'' || c == '"' || c == '`').trim();
    if unquoted == NO_ANSWER_REPLY {
        NO_ANSWER_REPLY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Text safe to show a user for a failed question. Details stay in the logs.
pub fn user_facing_message(error: &QaError) -> &'static str {
    if error.is_connectivity() {
        CONNECTIVITY_REPLY
    } else {
        GENERIC_ERROR_REPLY
    }
}
