//! Client for the hosted Unstructured document-partitioning API.

use crate::chunk::{Chunk, ChunkCategory};
use crate::config::get_config;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while partitioning a document.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// HTTP layer failed before receiving a response.
    #[error("Partition request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Partition service responded with an unexpected status code.
    #[error("Unexpected partition service response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Response body could not be decoded into elements.
    #[error("Malformed partition service response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by document partitioning backends.
#[async_trait]
pub trait DocumentPartitioner: Send + Sync {
    /// Split a raw document into categorized chunks, in document order.
    async fn partition(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<Chunk>, PartitionError>;
}

/// HTTP client for the hosted Unstructured general-partition endpoint.
pub struct UnstructuredClient {
    client: Client,
    base_url: String,
    api_key: String,
    languages: Vec<String>,
}

/// One element returned by the partition endpoint.
#[derive(Deserialize)]
struct PartitionElement {
    #[serde(rename = "type")]
    element_type: ChunkCategory,
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl UnstructuredClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, PartitionError> {
        let config = get_config();
        let client = Client::builder().user_agent("medsift/0.1").build()?;
        let languages = config
            .partition_languages
            .split(',')
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
            .collect();
        Ok(Self {
            client,
            base_url: config.unstructured_api_url.trim_end_matches('/').to_string(),
            api_key: config.unstructured_api_key.clone(),
            languages,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/general/v0/general", self.base_url)
    }
}

#[async_trait]
impl DocumentPartitioner for UnstructuredClient {
    async fn partition(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Vec<Chunk>, PartitionError> {
        let mut form = Form::new()
            .part("files", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("strategy", "hi_res");
        for language in &self.languages {
            form = form.text("languages", language.clone());
        }

        tracing::debug!(file_name, "Submitting document for partitioning");
        let response = self
            .client
            .post(self.endpoint())
            .header("unstructured-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = PartitionError::UnexpectedStatus { status, body };
            tracing::error!(file_name, error = %error, "Partition request rejected");
            return Err(error);
        }

        let elements: Vec<PartitionElement> = response.json().await.map_err(|err| {
            PartitionError::InvalidResponse(format!("failed to decode element list: {err}"))
        })?;

        let chunks: Vec<Chunk> = elements
            .into_iter()
            .map(|element| Chunk {
                text: element.text,
                category: element.element_type,
                metadata: element.metadata,
            })
            .collect();

        tracing::debug!(file_name, chunks = chunks.len(), "Document partitioned");
        Ok(chunks)
    }
}
