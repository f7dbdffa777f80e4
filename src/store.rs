//! Patient-scoped chunk storage on top of the embedding client and Qdrant.

use crate::chunk::Chunk;
use crate::config::get_config;
use crate::llm::{EMBEDDING_DIMENSION, EmbeddingClient, LlmError};
use crate::qdrant::{
    PointInsert, QdrantError, QdrantService, build_chunk_payload, current_timestamp_rfc3339,
    filters::patient_filter, payload_to_chunk,
};
use async_trait::async_trait;
use thiserror::Error;

/// Errors emitted by the chunk store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Embedding provider failed to produce vectors.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] LlmError),
    /// Qdrant interaction failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
}

/// Interface over patient-scoped chunk persistence and retrieval.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Tag every chunk with the patient id, embed the texts, and persist the
    /// points. Chunks with blank text are skipped before embedding; the
    /// embeddings endpoint rejects empty input. Any failure aborts the whole
    /// call; there is no partial-success path.
    async fn add_chunks(&self, chunks: Vec<Chunk>, patient_id: &str) -> Result<usize, StoreError>;

    /// Embed the query and return the top matching chunks whose stored
    /// `patient_id` equals the given id.
    async fn search(
        &self,
        query: &str,
        patient_id: &str,
        limit: usize,
    ) -> Result<Vec<Chunk>, StoreError>;
}

/// Chunk store bound to the configured Qdrant collection.
pub struct ChunkStore {
    embedder: Box<dyn EmbeddingClient>,
    qdrant: QdrantService,
    collection: String,
}

impl ChunkStore {
    /// Build the store, ensuring the backing collection and payload indexes exist.
    pub async fn new(embedder: Box<dyn EmbeddingClient>) -> Result<Self, StoreError> {
        let config = get_config();
        let qdrant = QdrantService::new()?;
        qdrant
            .create_collection_if_not_exists(
                &config.qdrant_collection_name,
                EMBEDDING_DIMENSION as u64,
            )
            .await?;
        qdrant
            .ensure_payload_indexes(&config.qdrant_collection_name)
            .await?;
        tracing::debug!(collection = %config.qdrant_collection_name, "Chunk collection ready");

        Ok(Self {
            embedder,
            qdrant,
            collection: config.qdrant_collection_name.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_parts(
        embedder: Box<dyn EmbeddingClient>,
        qdrant: QdrantService,
        collection: String,
    ) -> Self {
        Self {
            embedder,
            qdrant,
            collection,
        }
    }
}

#[async_trait]
impl VectorStore for ChunkStore {
    async fn add_chunks(
        &self,
        chunks: Vec<Chunk>,
        patient_id: &str,
    ) -> Result<usize, StoreError> {
        let mut tagged: Vec<Chunk> = chunks
            .into_iter()
            .filter(|chunk| !chunk.text.trim().is_empty())
            .collect();
        for chunk in &mut tagged {
            chunk.tag_patient(patient_id);
        }

        if tagged.is_empty() {
            tracing::debug!(patient_id, "No non-empty chunks to store");
            return Ok(0);
        }

        let texts: Vec<String> = tagged.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed(texts).await?;
        debug_assert_eq!(tagged.len(), embeddings.len());

        let now = current_timestamp_rfc3339();
        let points: Vec<PointInsert> = tagged
            .iter()
            .zip(embeddings)
            .map(|(chunk, vector)| PointInsert {
                vector,
                payload: build_chunk_payload(chunk, &now),
            })
            .collect();

        let stored = self.qdrant.upsert_points(&self.collection, points).await?;
        tracing::info!(
            collection = %self.collection,
            patient_id,
            chunks = stored,
            "Chunks stored"
        );
        Ok(stored)
    }

    async fn search(
        &self,
        query: &str,
        patient_id: &str,
        limit: usize,
    ) -> Result<Vec<Chunk>, StoreError> {
        let mut vectors = self.embedder.embed(vec![query.to_string()]).await?;
        let vector = vectors.pop().ok_or_else(|| {
            LlmError::InvalidResponse("embedding provider returned no vectors for the query".into())
        })?;

        let hits = self
            .qdrant
            .search_points(
                &self.collection,
                vector,
                Some(patient_filter(patient_id)),
                limit,
            )
            .await?;

        let chunks: Vec<Chunk> = hits
            .into_iter()
            .filter_map(|hit| hit.payload.and_then(payload_to_chunk))
            .collect();
        tracing::debug!(
            collection = %self.collection,
            patient_id,
            hits = chunks.len(),
            "Patient-scoped search completed"
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkCategory;
    use httpmock::{Method::POST, Method::PUT, MockServer};
    use serde_json::json;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingClient for FixedEmbedder {
        async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(texts.iter().map(|_| vec![0.5_f32; 4]).collect())
        }
    }

    fn store_for(server: &MockServer) -> ChunkStore {
        let qdrant = QdrantService {
            client: reqwest::Client::builder()
                .user_agent("medsift-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: None,
        };
        ChunkStore::with_parts(Box::new(FixedEmbedder), qdrant, "patient-docs".into())
    }

    #[tokio::test]
    async fn add_chunks_tags_every_point_with_the_patient() {
        let server = MockServer::start_async().await;
        let upsert = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/patient-docs/points")
                    .body_contains("\"patient_id\":\"patient-9\"");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        let store = store_for(&server);
        let stored = store
            .add_chunks(
                vec![
                    Chunk::new("Report", ChunkCategory::Header),
                    Chunk::new("Patient is stable.", ChunkCategory::NarrativeText),
                    Chunk::new("   ", ChunkCategory::NarrativeText),
                ],
                "patient-9",
            )
            .await
            .expect("chunks stored");

        upsert.assert_async().await;
        // The blank chunk is skipped before embedding.
        assert_eq!(stored, 2);
    }

    #[tokio::test]
    async fn search_rebuilds_chunks_from_payloads() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/patient-docs/points/query");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": [
                        {
                            "id": "p1",
                            "score": 0.8,
                            "payload": {
                                "text": "Blood pressure 120/80.",
                                "category": "NarrativeText",
                                "patient_id": "patient-9"
                            }
                        }
                    ]
                }));
            })
            .await;

        let store = store_for(&server);
        let chunks = store
            .search("blood pressure", "patient-9", 4)
            .await
            .expect("search succeeds");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Blood pressure 120/80.");
        assert_eq!(chunks[0].patient_id(), Some("patient-9"));
    }
}
