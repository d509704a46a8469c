//! Blocking HTTP client for the Gemini generateContent and embedContent endpoints

use super::{LlmError, TextGenerator};
use crate::config::LlmConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API client
///
/// Serves both as the text generator (classification, rewriting, severity
/// opinion) and as the online embedding provider.
#[derive(Debug)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    temperature: f32,
    dimension: usize,
}

impl GeminiClient {
    /// Build a client from the `llm` config section, reading the key from `api_key_env`
    pub fn from_config(config: &LlmConfig, dimension: usize) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(format!("{} not set", config.api_key_env)))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            dimension,
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            self.model.trim_start_matches("models/")
        )
    }

    fn embed_url(&self) -> String {
        format!("{}/v1beta/{}:embedContent", self.base_url, self.embedding_model_path())
    }

    fn embedding_model_path(&self) -> String {
        if self.embedding_model.starts_with("models/") {
            self.embedding_model.clone()
        } else {
            format!("models/{}", self.embedding_model)
        }
    }

    fn post<T: Serialize>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<reqwest::blocking::Response, LlmError> {
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().unwrap_or_else(|_| "(no body)".into());
            return Err(LlmError::ApiError {
                status,
                message: body,
            });
        }

        Ok(response)
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self.embedding_model_path();
        let request = EmbedRequest {
            model: &model,
            content: Content {
                parts: vec![Part { text }],
            },
            task_type: "RETRIEVAL_DOCUMENT",
        };

        let response: EmbedResponse = self
            .post(&self.embed_url(), &request)?
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse embedding: {e}")))?;

        Ok(response.embedding.values)
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response: GenerateResponse = self
            .post(&self.generate_url(), &request)?
            .json()
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .map(|text| text.trim().to_string())
            .ok_or_else(|| LlmError::InvalidResponse("no candidate text".into()))
    }
}

impl EmbeddingProvider for GeminiClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        self.embed_text(text)
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embedding_model
    }
}
