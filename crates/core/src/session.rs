use crate::chunking::{split_segments, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::QaError;
use crate::ingest::DocumentSource;
use crate::llm::LanguageModel;
use crate::models::Answer;
use crate::orchestrator::{user_facing_message, AnswerSettings, Answerer};
use crate::store::InMemoryIndex;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const INIT_FAILED_REPLY: &str =
    "Sorry, the QA system failed to initialize. Please check the server logs.";

pub type ReadyAnswerer<E, L> = Answerer<E, L, InMemoryIndex>;

pub enum SessionState<E, L>
where
    E: Embedder + ?Sized,
    L: LanguageModel + ?Sized,
{
    Uninitialized,
    Ready(Arc<ReadyAnswerer<E, L>>),
}

/// Owns the pipeline for one process: built lazily on first use, then reused.
///
/// A failed build leaves the session uninitialized so the next question retries it.
pub struct QaSession<S, E, L>
where
    S: DocumentSource,
    E: Embedder + ?Sized,
    L: LanguageModel + ?Sized,
{
    source: S,
    embedder: Arc<E>,
    model: Arc<L>,
    chunking: ChunkingConfig,
    settings: AnswerSettings,
    state: SessionState<E, L>,
}

impl<S, E, L> QaSession<S, E, L>
where
    S: DocumentSource,
    E: Embedder + ?Sized,
    L: LanguageModel + ?Sized,
{
    pub fn new(source: S, embedder: Arc<E>, model: Arc<L>) -> Self {
        Self {
            source,
            embedder,
            model,
            chunking: ChunkingConfig::default(),
            settings: AnswerSettings::default(),
            state: SessionState::Uninitialized,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_answer_settings(mut self, settings: AnswerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> &SessionState<E, L> {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    pub async fn initialize(&mut self) -> Result<Arc<ReadyAnswerer<E, L>>, QaError> {
        if let SessionState::Ready(answerer) = &self.state {
            return Ok(Arc::clone(answerer));
        }

        let answerer = Arc::new(self.build().await?);
        self.state = SessionState::Ready(Arc::clone(&answerer));
        info!("QA system initialized");
        Ok(answerer)
    }

    /// Drops the current index and ingests the source again.
    pub async fn reinitialize(&mut self) -> Result<Arc<ReadyAnswerer<E, L>>, QaError> {
        self.state = SessionState::Uninitialized;
        self.initialize().await
    }

    async fn build(&self) -> Result<ReadyAnswerer<E, L>, QaError> {
        info!(source = %self.source.describe(), "initializing QA system");

        let report = self.source.load().await?;
        info!(
            documents = report.document_count(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "documents loaded"
        );
        if report.segments.is_empty() {
            warn!("no documents loaded from the source");
            return Err(QaError::NoDocuments);
        }

        let chunks = split_segments(&report.segments, self.chunking)?;
        info!(chunks = chunks.len(), "documents split into chunks");

        let index = InMemoryIndex::build(chunks, self.embedder.as_ref()).await?;
        Ok(Answerer::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.model),
            index,
            self.settings,
        ))
    }

    /// Full answer with its sources. Initializes first if needed.
    pub async fn answer(&mut self, question: &str) -> Result<Answer, QaError> {
        let answerer = self.initialize().await?;
        answerer.answer(question).await
    }

    /// Always returns text for the user; failures are logged and replaced by fixed messages.
    pub async fn ask(&mut self, question: &str) -> String {
        let answerer = match self.initialize().await {
            Ok(answerer) => answerer,
            Err(error) => {
                error!(%error, "QA system initialization failed");
                return INIT_FAILED_REPLY.to_string();
            }
        };

        match answerer.answer(question).await {
            Ok(answer) => answer.text,
            Err(error) => {
                error!(%error, "question failed");
                user_facing_message(&error).to_string()
            }
        }
    }
}
