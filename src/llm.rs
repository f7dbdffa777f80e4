//! OpenAI chat and embeddings client plus the traits the orchestrators
//! consume.
//!
//! Structured extraction relies on the chat completions `json_schema`
//! response format with `strict` enforcement, so model output always
//! deserializes into the requested type or the call fails.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Dimensionality of every stored and queried embedding vector.
pub const EMBEDDING_DIMENSION: usize = 1536;

/// Errors raised by the language-model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP layer failed before receiving a response.
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected LLM provider response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider response could not be decoded.
    #[error("Malformed LLM provider response: {0}")]
    InvalidResponse(String),
    /// Returned embedding dimension does not match [`EMBEDDING_DIMENSION`].
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension.
        expected: usize,
        /// Actual embedding dimension produced by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce one embedding vector per supplied text.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError>;
}

/// Interface implemented by chat-completion backends.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Free-text completion for a system/user prompt pair.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Completion constrained to a strict JSON schema; returns the parsed
    /// message content.
    async fn complete_structured(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        schema: Value,
    ) -> Result<Value, LlmError>;
}

/// Client for the OpenAI chat and embeddings endpoints.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: Option<String>,
}

impl OpenAiClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, LlmError> {
        let config = get_config();
        let http = Client::builder().user_agent("medsift/0.1").build()?;
        Ok(Self {
            http,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            chat_model: config.openai_chat_model.clone(),
            embedding_model: config.openai_embedding_model.clone(),
        })
    }

    async fn chat(&self, body: Value) -> Result<String, LlmError> {
        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = LlmError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Chat completion failed");
            return Err(error);
        }

        let payload: ChatResponse = response.json().await.map_err(|err| {
            LlmError::InvalidResponse(format!("failed to decode chat completion: {err}"))
        })?;

        extract_message_content(payload)
    }
}

/// Rewrite a generated JSON schema to satisfy the provider's strict mode.
///
/// Strict mode demands that every object schema lists all of its properties
/// under `required` and sets `additionalProperties: false`; submissions that
/// miss either rule are rejected with `invalid_json_schema` before the model
/// runs. Optional fields stay expressible because their generated schemas
/// already admit `null`. Applied recursively, including nested definitions.
fn enforce_strict_schema(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            let property_names: Option<Vec<Value>> = match map.get("properties") {
                Some(Value::Object(properties)) => Some(
                    properties
                        .keys()
                        .map(|key| Value::String(key.clone()))
                        .collect(),
                ),
                _ => None,
            };
            if let Some(names) = property_names {
                map.insert("required".into(), Value::Array(names));
                map.insert("additionalProperties".into(), Value::Bool(false));
            }
            for value in map.values_mut() {
                enforce_strict_schema(value);
            }
        }
        Value::Array(items) => {
            for value in items {
                enforce_strict_schema(value);
            }
        }
        _ => {}
    }
}

fn extract_message_content(payload: ChatResponse) -> Result<String, LlmError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::InvalidResponse("completion contained no message content".into()))
}

#[async_trait]
impl EmbeddingClient for OpenAiClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
        tracing::debug!(
            model = %self.embedding_model,
            inputs = texts.len(),
            "Generating embeddings"
        );
        let response = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.embedding_model,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = LlmError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Embedding request failed");
            return Err(error);
        }

        let payload: EmbeddingsResponse = response.json().await.map_err(|err| {
            LlmError::InvalidResponse(format!("failed to decode embeddings: {err}"))
        })?;

        let vectors: Vec<Vec<f32>> = payload
            .data
            .into_iter()
            .map(|row| row.embedding)
            .collect();

        for vector in &vectors {
            if vector.len() != EMBEDDING_DIMENSION {
                return Err(LlmError::DimensionMismatch {
                    expected: EMBEDDING_DIMENSION,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.chat(json!({
            "model": self.chat_model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        }))
        .await
    }

    async fn complete_structured(
        &self,
        system: &str,
        user: &str,
        schema_name: &str,
        mut schema: Value,
    ) -> Result<Value, LlmError> {
        enforce_strict_schema(&mut schema);
        let content = self
            .chat(json!({
                "model": self.chat_model,
                "temperature": 0,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": schema_name,
                        "strict": true,
                        "schema": schema,
                    }
                },
            }))
            .await?;

        serde_json::from_str(&content).map_err(|err| {
            LlmError::InvalidResponse(format!("structured completion is not valid JSON: {err}"))
        })
    }
}
