//! Extraction orchestrator: partition, persist, format, and fan out to three
//! concurrent structured-extraction calls.

use crate::fhir::Bundle;
use crate::llm::{ChatClient, LlmError};
use crate::markdown::combine_chunks;
use crate::partition::{DocumentPartitioner, PartitionError};
use crate::store::{StoreError, VectorStore};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cleaned document text with clinical wording preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlainText {
    /// Reformulated document text.
    pub text: String,
}

/// Document text rewritten in lay language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimplifiedText {
    /// Reformulated document text.
    pub text: String,
}

/// Combined result of a successful extraction.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// Structured clinical bundle.
    pub bundle: Bundle,
    /// Verbatim-preserving plain text.
    pub plain_text: PlainText,
    /// Lay-readable rendition.
    pub simplified: SimplifiedText,
}

/// Errors emitted by the extraction pipeline.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Partitioning service failed to produce chunks.
    #[error("Failed to partition document: {0}")]
    Partition(#[from] PartitionError),
    /// Chunk persistence failed; the extraction is aborted.
    #[error("Failed to store document chunks: {0}")]
    Store(#[from] StoreError),
    /// One of the structured-extraction calls failed.
    #[error("Extraction call failed: {0}")]
    Llm(#[from] LlmError),
    /// Model returned schema-valid JSON that still failed to decode.
    #[error("Failed to decode structured extraction ({target}): {message}")]
    Decode {
        /// Name of the target schema.
        target: &'static str,
        /// Decoder error description.
        message: String,
    },
}

const FHIR_SYSTEM_PROMPT: &str = "You are an expert at converting medical documents into HL7 \
FHIR resources. Extract all relevant clinical information and structure it according to FHIR R4 \
standards.\n\nGuidelines:\n- Populate every required FHIR field, and fill optional fields \
whenever the source supports them.\n- Use standard codings (LOINC, SNOMED CT, ...) where \
applicable.\n- Set proper status and category fields on observations.\n- Include dates and \
times when available.\n- Extract only information explicitly stated in the source, but extract \
as much of it as possible.\n- Keep wording, formatting, and language as close to the original \
document as possible.";

const PLAIN_TEXT_SYSTEM_PROMPT: &str = "You are an expert at extracting relevant medical \
information from documents. Convert the markdown-formatted medical report into clean plain \
text.\n\nPreserve all important medical information: patient details, diagnoses, medications, \
test results, treatment plans, and clinical observations. Keep original medical terminology, \
exact values, and sentence structure where possible. Remove formatting markers, headers, \
footers, and page numbers, and skip administrative metadata. Keep the text and its language as \
close to the original as possible.\n\nReturn only the essential medical content in plain text \
format.";

const SIMPLIFIED_SYSTEM_PROMPT: &str = "You are an expert at explaining medical information in \
simple terms that anyone can understand. Convert the medical report into clear, everyday \
language.\n\nReplace medical jargon with simple explanations, break complex concepts into \
easy-to-understand terms, and use everyday analogies where helpful. Keep every clinically \
material fact: what the doctor found, what the diagnosis means, what medications are for, what \
test results mean, and what the treatment plan involves and why. Use short, clear sentences \
with a friendly, reassuring tone, and avoid oversimplifying critical medical details.\n\nThe \
goal is to help patients and family members clearly understand the medical information.";

/// Run the full extraction pipeline for one document.
///
/// Sequential steps: partition the file, tag and persist every chunk for the
/// patient, render the chunks to markdown, then issue the three
/// structured-extraction calls concurrently. All-or-nothing: any failure at
/// any step fails the whole extraction, and no external call is retried.
pub async fn run_extraction(
    partitioner: &dyn DocumentPartitioner,
    chat: &dyn ChatClient,
    store: &dyn VectorStore,
    file_name: &str,
    bytes: Vec<u8>,
    patient_id: &str,
) -> Result<ExtractionOutcome, ExtractError> {
    let chunks = partitioner.partition(file_name, bytes).await?;
    tracing::info!(file_name, patient_id, chunks = chunks.len(), "Document partitioned");

    store.add_chunks(chunks.clone(), patient_id).await?;

    let markdown = combine_chunks(&chunks);
    let fhir_user = format!("Medical Report:\n{markdown}");

    let (bundle, plain_text, simplified) = tokio::try_join!(
        extract_structured::<Bundle>(chat, FHIR_SYSTEM_PROMPT, &fhir_user, "clinical_bundle"),
        extract_structured::<PlainText>(chat, PLAIN_TEXT_SYSTEM_PROMPT, &markdown, "plain_text"),
        extract_structured::<SimplifiedText>(
            chat,
            SIMPLIFIED_SYSTEM_PROMPT,
            &markdown,
            "simplified_text",
        ),
    )?;

    tracing::info!(
        file_name,
        patient_id,
        entries = bundle.entry.len(),
        plain_text_len = plain_text.text.len(),
        simplified_len = simplified.text.len(),
        "Extraction completed"
    );

    Ok(ExtractionOutcome {
        bundle,
        plain_text,
        simplified,
    })
}

/// Issue one schema-constrained extraction call and decode the result.
async fn extract_structured<T>(
    chat: &dyn ChatClient,
    system: &str,
    user: &str,
    schema_name: &'static str,
) -> Result<T, ExtractError>
where
    T: DeserializeOwned + JsonSchema,
{
    let schema = serde_json::to_value(schemars::schema_for!(T)).map_err(|err| {
        ExtractError::Decode {
            target: schema_name,
            message: format!("failed to render schema: {err}"),
        }
    })?;

    let value = chat
        .complete_structured(system, user, schema_name, schema)
        .await?;

    serde_json::from_value(value).map_err(|err| ExtractError::Decode {
        target: schema_name,
        message: err.to_string(),
    })
}
