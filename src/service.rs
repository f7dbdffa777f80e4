//! Service wiring the pipeline components behind one seam for the HTTP layer.

use crate::extraction::{ExtractError, ExtractionOutcome, run_extraction};
use crate::llm::{ChatClient, OpenAiClient};
use crate::partition::{DocumentPartitioner, UnstructuredClient};
use crate::store::{ChunkStore, VectorStore};
use crate::suggestion::{ChatMessage, SuggestError, Suggestion, run_suggestion};
use async_trait::async_trait;

/// Abstraction over the document pipeline used by the HTTP surface.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Partition, persist, and extract one downloaded document.
    async fn extract_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        patient_id: &str,
    ) -> Result<ExtractionOutcome, ExtractError>;

    /// Produce a grounded follow-up suggestion for a patient conversation.
    async fn suggest(
        &self,
        patient_id: &str,
        history: &[ChatMessage],
    ) -> Result<Suggestion, SuggestError>;
}

/// Owns the long-lived partitioner, chat client, and chunk store.
///
/// Construct once near process start and share through an `Arc`; the two
/// endpoints reuse the same component handles.
pub struct DocumentService {
    partitioner: Box<dyn DocumentPartitioner>,
    chat: Box<dyn ChatClient>,
    store: Box<dyn VectorStore>,
}

impl DocumentService {
    /// Build the service, initializing backing clients and ensuring the chunk
    /// collection exists.
    pub async fn new() -> Self {
        let partitioner =
            Box::new(UnstructuredClient::new().expect("Failed to construct partition client"));
        let chat = Box::new(OpenAiClient::new().expect("Failed to construct chat client"));
        let embedder = Box::new(OpenAiClient::new().expect("Failed to construct embedding client"));
        let store = Box::new(
            ChunkStore::new(embedder)
                .await
                .expect("Failed to prepare chunk store"),
        );
        tracing::info!("Document service initialized");

        Self {
            partitioner,
            chat,
            store,
        }
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    async fn extract_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        patient_id: &str,
    ) -> Result<ExtractionOutcome, ExtractError> {
        run_extraction(
            self.partitioner.as_ref(),
            self.chat.as_ref(),
            self.store.as_ref(),
            file_name,
            bytes,
            patient_id,
        )
        .await
    }

    async fn suggest(
        &self,
        patient_id: &str,
        history: &[ChatMessage],
    ) -> Result<Suggestion, SuggestError> {
        run_suggestion(self.chat.as_ref(), self.store.as_ref(), patient_id, history).await
    }
}
