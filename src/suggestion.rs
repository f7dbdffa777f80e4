//! Suggestion orchestrator: rewrite a chat transcript into a search query,
//! retrieve the patient's relevant chunks, and produce a grounded follow-up
//! suggestion.

use crate::chunk::Chunk;
use crate::llm::{ChatClient, LlmError};
use crate::store::{StoreError, VectorStore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of grounding chunks retrieved per suggestion request.
pub const SUGGESTION_TOP_K: usize = 4;

/// One turn in a doctor/patient conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// True when the turn was written by the organisation (doctor side).
    pub is_organisation_message: bool,
    /// Message text.
    pub content: String,
}

/// A proposed next message plus the chunks used to ground it.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    /// Suggested next message or action.
    pub answer: String,
    /// Exact chunks supplied to the model as grounding, for attribution.
    pub sources: Vec<Chunk>,
}

/// Errors emitted by the suggestion pipeline.
#[derive(Debug, Error)]
pub enum SuggestError {
    /// Chat model call failed.
    #[error("Suggestion model call failed: {0}")]
    Llm(#[from] LlmError),
    /// Patient-scoped retrieval failed.
    #[error("Failed to retrieve grounding chunks: {0}")]
    Store(#[from] StoreError),
}

const QUERY_REWRITE_PROMPT: &str = "Given the chat history, formulate a search query that will \
help find relevant information to make a suggestion for the next message or action. Focus on \
key topics and themes from the conversation.";

const SUGGESTION_PROMPT: &str = "You are an expert at making suggestions based on medical \
information. You are given a chat history and a list of documents that are relevant to the \
conversation. Make a suggestion for the next message or action based on the chat history and \
the documents.";

/// Render the chat history into a single chronological transcript.
///
/// Each turn is labeled `Doctor` or `Patient` based on its organisation flag.
/// An empty history yields an empty transcript.
pub fn format_transcript(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|message| {
            let speaker = if message.is_organisation_message {
                "Doctor"
            } else {
                "Patient"
            };
            format!("{speaker}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the suggestion pipeline for one request.
///
/// Every step propagates failure to the synchronous caller; nothing is
/// retried. The returned sources are the exact chunk objects supplied to the
/// model as grounding context.
pub async fn run_suggestion(
    chat: &dyn ChatClient,
    store: &dyn VectorStore,
    patient_id: &str,
    history: &[ChatMessage],
) -> Result<Suggestion, SuggestError> {
    let transcript = format_transcript(history);

    let query = chat.complete(QUERY_REWRITE_PROMPT, &transcript).await?;
    tracing::debug!(patient_id, query = %query, "Rewrote chat history into search query");

    let sources = store
        .search(&query, patient_id, SUGGESTION_TOP_K)
        .await?;

    let context = sources
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let system = format!("{SUGGESTION_PROMPT}\n\n{context}");

    let answer = chat.complete(&system, &transcript).await?;
    tracing::info!(
        patient_id,
        sources = sources.len(),
        answer_len = answer.len(),
        "Suggestion generated"
    );

    Ok(Suggestion { answer, sources })
}
