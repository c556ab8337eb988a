//! Generative model adapters used for summaries, flashcards, and answers.
//!
//! Two backends are supported: Google Gemini's `generateContent` REST API and a local Ollama
//! runtime. Both are reached with plain `reqwest` calls and normalize failures into
//! [`GenerationClientError`].

use crate::config::{Config, SummarizationProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced while calling a generative provider.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider was misconfigured or unreachable.
    #[error("Generative provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate content: {0}")]
    GenerationFailed(String),
    /// Provider refused the prompt.
    #[error("Prompt was blocked by the provider: {0}")]
    Blocked(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request passed to a generative provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Complete prompt text.
    pub prompt: String,
    /// Output token budget.
    pub max_output_tokens: usize,
    /// Ask the provider to emit JSON only.
    pub json_output: bool,
}

impl GenerationRequest {
    /// Plain-text request.
    pub fn text(prompt: impl Into<String>, max_output_tokens: usize) -> Self {
        Self {
            prompt: prompt.into(),
            max_output_tokens,
            json_output: false,
        }
    }

    /// JSON-mode request.
    pub fn json(prompt: impl Into<String>, max_output_tokens: usize) -> Self {
        Self {
            prompt: prompt.into(),
            max_output_tokens,
            json_output: true,
        }
    }
}

/// Interface implemented by generative providers.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Generate text for the given prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Build the generative client selected by configuration.
pub fn build_generative_client(
    config: &Config,
) -> Result<Arc<dyn GenerativeClient>, GenerationClientError> {
    match config.summarization_provider {
        SummarizationProvider::Gemini => {
            let api_key = config.gemini_api_key.clone().ok_or_else(|| {
                GenerationClientError::ProviderUnavailable("GEMINI_API_KEY is not set".into())
            })?;
            Ok(Arc::new(GeminiClient::new(
                config.gemini_url.clone(),
                config.summarization_model.clone(),
                api_key,
            )?))
        }
        SummarizationProvider::Ollama => Ok(Arc::new(OllamaGenerativeClient::new(
            config.ollama_url.clone(),
            config.summarization_model.clone(),
        )?)),
    }
}

fn http_client(agent: &str) -> Result<Client, GenerationClientError> {
    Client::builder()
        .user_agent(agent)
        .build()
        .map_err(|error| GenerationClientError::ProviderUnavailable(error.to_string()))
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini client (`POST /v1beta/models/{model}:generateContent`).
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    /// Create a client for `model` at `base_url` authenticated with `api_key`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, GenerationClientError> {
        Ok(Self {
            http: http_client("summeryai/gemini")?,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn payload(request: &GenerationRequest) -> Value {
        let mut generation_config = json!({ "maxOutputTokens": request.max_output_tokens });
        if request.json_output {
            generation_config["responseMimeType"] = json!("application/json");
        }
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": generation_config,
        })
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        tracing::debug!(
            model = %self.model,
            max_output_tokens = request.max_output_tokens,
            json_output = request.json_output,
            "Calling Gemini"
        );
        let response = self
            .http
            .post(self.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&Self::payload(&request))
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Gemini at {}: {}",
                    self.base_url,
                    error.without_url()
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Gemini request failed");
            return Err(GenerationClientError::GenerationFailed(format!(
                "Gemini returned {status}"
            )));
        }

        let body: GeminiResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Gemini response: {error}"
            ))
        })?;

        if let Some(reason) = body
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone())
        {
            return Err(GenerationClientError::Blocked(reason));
        }

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .ok_or_else(|| {
                GenerationClientError::InvalidResponse("no candidates in Gemini response".into())
            })?;

        Ok(text.trim().to_string())
    }
}

/// Ollama client (`POST /api/generate`).
pub struct OllamaGenerativeClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerativeClient {
    /// Create a client for `model` at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationClientError> {
        Ok(Self {
            http: http_client("summeryai/ollama")?,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerativeClient for OllamaGenerativeClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let mut payload = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": 0.1,
                "num_predict": request.max_output_tokens,
            }
        });
        if request.json_output {
            payload["format"] = json!("json");
        }

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {}",
                    self.base_url,
                    error.without_url()
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Ollama request failed");
            return Err(GenerationClientError::GenerationFailed(format!(
                "Ollama returned {status}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}
