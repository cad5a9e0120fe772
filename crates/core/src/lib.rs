pub mod auth;
pub mod chunking;
pub mod config;
pub mod drive;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod traits;

#[cfg(test)]
mod testing;

pub use auth::{
    AuthorizationPrompt, AuthorizedUser, ClientSecrets, CredentialProvider, InstalledAppFlow,
    StaticToken,
};
pub use chunking::{split_segments, split_text, ChunkingConfig};
pub use config::QaConfig;
pub use drive::{DriveApi, DriveClient, DriveListing};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, GeminiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    GEMINI_EMBEDDING_DIMENSIONS,
};
pub use error::{AuthError, ConfigError, IngestError, QaError};
pub use extractor::{extension_format, DocumentExtractor, FormatExtractor};
pub use fetcher::{DriveFetcher, LocalArtifact};
pub use ingest::{
    DocumentSource, FailedFile, IngestionReport, LoadedFile, LocalFolderSource, SkipReason,
    SkippedFile,
};
pub use llm::{GeminiChat, GenerationOptions, LanguageModel};
pub use models::{
    Answer, Chunk, ContentCategory, DownloadPlan, FileFormat, RemoteFile, ScoredChunk,
    TextSegment,
};
pub use orchestrator::{
    user_facing_message, AnswerSettings, Answerer, CONNECTIVITY_REPLY, GENERIC_ERROR_REPLY,
    NO_ANSWER_REPLY,
};
pub use session::{QaSession, SessionState, INIT_FAILED_REPLY};
pub use store::InMemoryIndex;
pub use traits::VectorIndex;
