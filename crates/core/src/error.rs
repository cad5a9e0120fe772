use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("docx read error: {0}")]
    Docx(#[from] zip::result::ZipError),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("documents split into 0 chunks, cannot build a vector index")]
    NoChunks,

    #[error("drive request {operation} returned {status}: {details}")]
    DriveStatus {
        operation: String,
        status: u16,
        details: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("client secrets file not found: {0}. Ensure it is in the 'config/' folder.")]
    MissingClientSecrets(String),

    #[error("client secrets file has no 'installed' or 'web' section: {0}")]
    InvalidClientSecrets(String),

    #[error("token endpoint returned {status}: {details}")]
    TokenEndpoint { status: u16, details: String },

    #[error("authorization was not completed: {0}")]
    Authorization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set. Please ensure it is set in your .env file.")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {details}")]
    Invalid {
        name: &'static str,
        value: String,
        details: String,
    },
}

#[derive(Debug, Error)]
pub enum QaError {
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("no documents successfully loaded from the knowledge base")]
    NoDocuments,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("embedding request failed: {0}")]
    Embedding(String),

    #[error("vector index build failed: {0}")]
    IndexBuild(String),

    #[error("{backend} returned {status}: {details}")]
    BackendStatus {
        backend: String,
        status: u16,
        details: String,
    },

    #[error("malformed response from {backend}: {details}")]
    MalformedResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl QaError {
    /// True when the failure looks like a network, credential or API-key problem.
    pub fn is_connectivity(&self) -> bool {
        match self {
            QaError::Http(error) => {
                error.is_connect()
                    || error.is_timeout()
                    || error
                        .status()
                        .is_some_and(|status| status.as_u16() == 401 || status.as_u16() == 403)
            }
            QaError::BackendStatus { status, .. } => {
                *status == 401 || *status == 403 || mentions_connectivity(self)
            }
            QaError::Ingest(IngestError::Auth(_)) => true,
            other => mentions_connectivity(other),
        }
    }
}

fn mentions_connectivity(error: &QaError) -> bool {
    let text = error.to_string().to_lowercase();
    text.contains("api key") || text.contains("network")
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_backend_status_counts_as_connectivity() {
        let error = QaError::BackendStatus {
            backend: "gemini".to_string(),
            status: 403,
            details: "forbidden".to_string(),
        };
        assert!(error.is_connectivity());
    }

    #[test]
    fn invalid_api_key_bad_request_counts_as_connectivity() {
        let error = QaError::BackendStatus {
            backend: "gemini".to_string(),
            status: 400,
            details: r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#.to_string(),
        };
        assert!(error.is_connectivity());

        let plain = QaError::BackendStatus {
            backend: "gemini".to_string(),
            status: 400,
            details: "prompt too long".to_string(),
        };
        assert!(!plain.is_connectivity());
    }

    #[test]
    fn api_key_hint_in_text_counts_as_connectivity() {
        let error = QaError::Embedding("API key not valid. Please pass a valid API key.".to_string());
        assert!(error.is_connectivity());
    }

    #[test]
    fn malformed_response_is_not_connectivity() {
        let error = QaError::MalformedResponse {
            backend: "gemini".to_string(),
            details: "no candidates".to_string(),
        };
        assert!(!error.is_connectivity());
    }
}
