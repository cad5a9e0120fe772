use crate::auth::{DEFAULT_CREDENTIALS_PATH, DEFAULT_TOKEN_PATH};
use crate::chunking::ChunkingConfig;
use crate::embeddings::DEFAULT_EMBEDDING_MODEL;
use crate::error::ConfigError;
use crate::llm::{GenerationOptions, DEFAULT_CHAT_MODEL};
use crate::orchestrator::AnswerSettings;
use std::path::PathBuf;
use std::str::FromStr;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const FOLDER_ID_VAR: &str = "GOOGLE_DRIVE_QA_FOLDER_ID";
pub const TOP_K_VAR: &str = "QA_TOP_K";
pub const CHUNK_SIZE_VAR: &str = "QA_CHUNK_SIZE";
pub const CHUNK_OVERLAP_VAR: &str = "QA_CHUNK_OVERLAP";
pub const CHAT_MODEL_VAR: &str = "QA_CHAT_MODEL";
pub const TEMPERATURE_VAR: &str = "QA_TEMPERATURE";
pub const TOKEN_PATH_VAR: &str = "QA_TOKEN_PATH";
pub const CREDENTIALS_PATH_VAR: &str = "QA_CREDENTIALS_PATH";

/// Process configuration. The API key and folder id are mandatory.
#[derive(Debug, Clone)]
pub struct QaConfig {
    pub api_key: String,
    pub folder_id: String,
    pub chunking: ChunkingConfig,
    pub answer: AnswerSettings,
    pub chat_model: String,
    pub embedding_model: String,
    pub token_path: PathBuf,
    pub credentials_path: PathBuf,
}

impl QaConfig {
    pub fn new(api_key: &str, folder_id: &str) -> Result<Self, ConfigError> {
        let api_key = non_empty(Some(api_key.to_string())).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let folder_id =
            non_empty(Some(folder_id.to_string())).ok_or(ConfigError::Missing(FOLDER_ID_VAR))?;

        Ok(Self {
            api_key,
            folder_id,
            chunking: ChunkingConfig::default(),
            answer: AnswerSettings::default(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_empty(lookup(API_KEY_VAR)).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let folder_id =
            non_empty(lookup(FOLDER_ID_VAR)).ok_or(ConfigError::Missing(FOLDER_ID_VAR))?;
        let mut config = Self::new(&api_key, &folder_id)?;

        if let Some(top_k) = parse_var::<usize>(&lookup, TOP_K_VAR)? {
            config.answer.top_k = top_k;
        }
        if let Some(max_chars) = parse_var::<usize>(&lookup, CHUNK_SIZE_VAR)? {
            config.chunking.max_chars = max_chars;
        }
        if let Some(overlap_chars) = parse_var::<usize>(&lookup, CHUNK_OVERLAP_VAR)? {
            config.chunking.overlap_chars = overlap_chars;
        }
        if let Some(temperature) = parse_var::<f32>(&lookup, TEMPERATURE_VAR)? {
            config.answer.generation = GenerationOptions { temperature };
        }
        if let Some(model) = non_empty(lookup(CHAT_MODEL_VAR)) {
            config.chat_model = model;
        }
        if let Some(path) = non_empty(lookup(TOKEN_PATH_VAR)) {
            config.token_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty(lookup(CREDENTIALS_PATH_VAR)) {
            config.credentials_path = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking
            .validate()
            .map_err(|error| ConfigError::Invalid {
                name: CHUNK_OVERLAP_VAR,
                value: self.chunking.overlap_chars.to_string(),
                details: error.to_string(),
            })?;

        if self.answer.top_k == 0 {
            return Err(ConfigError::Invalid {
                name: TOP_K_VAR,
                value: "0".to_string(),
                details: "at least one chunk must be retrieved".to_string(),
            });
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = non_empty(lookup(name)) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|error| ConfigError::Invalid {
            name,
            value: raw.clone(),
            details: error.to_string(),
        })
}
