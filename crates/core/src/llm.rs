use crate::embeddings::GEMINI_API_BASE;
use crate::error::QaError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Single-turn text generation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String, QaError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Gemini `generateContent` client.
pub struct GeminiChat {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiChat {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: GEMINI_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_CHAT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self) -> Result<Url, QaError> {
        let mut url = Url::parse(&self.api_base)?.join(&format!(
            "v1beta/models/{}:generateContent",
            self.model
        ))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl LanguageModel for GeminiChat {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> Result<String, QaError> {
        let body = GenerateRequest {
            contents: [RequestContent {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
            },
        };

        let response = self.client.post(self.endpoint()?).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QaError::BackendStatus {
                backend: "gemini".to_string(),
                status: status.as_u16(),
                details: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        answer_text(parsed)
    }
}

fn answer_text(response: GenerateResponse) -> Result<String, QaError> {
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(QaError::MalformedResponse {
            backend: "gemini".to_string(),
            details: "response carried no candidate text".to_string(),
        });
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_joins_candidate_parts() -> Result<(), Box<dyn std::error::Error>> {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Use the "},{"text":"staging env."}]}}]}"#,
        )?;
        assert_eq!(answer_text(response)?, "Use the staging env.");
        Ok(())
    }

    #[test]
    fn blocked_response_is_malformed() -> Result<(), Box<dyn std::error::Error>> {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)?;
        assert!(matches!(
            answer_text(response),
            Err(QaError::MalformedResponse { .. })
        ));
        Ok(())
    }

    #[test]
    fn request_uses_low_temperature_by_default() -> Result<(), serde_json::Error> {
        let body = GenerateRequest {
            contents: [RequestContent {
                role: "user",
                parts: [RequestPart { text: "q" }],
            }],
            generation_config: GenerationConfig {
                temperature: GenerationOptions::default().temperature,
            },
        };
        let value = serde_json::to_value(&body)?;
        let temperature = value["generationConfig"]["temperature"]
            .as_f64()
            .unwrap_or_default();
        assert!((temperature - 0.2).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn endpoint_names_the_model() -> Result<(), QaError> {
        let chat = GeminiChat::new("k").with_model("gemini-1.5-pro");
        let url = chat.endpoint()?;
        assert!(url.path().ends_with("/models/gemini-1.5-pro:generateContent"));
        Ok(())
    }
}
