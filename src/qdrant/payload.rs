//! Helpers for constructing and reading chunk payloads.

use crate::chunk::{Chunk, ChunkCategory};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

const TEXT_KEY: &str = "text";
const CATEGORY_KEY: &str = "category";
const TIMESTAMP_KEY: &str = "timestamp";

/// Build the payload object stored alongside each indexed chunk.
///
/// The chunk's free-form metadata (including the patient tag) is flattened
/// into the payload next to the text, category, and storage timestamp.
pub fn build_chunk_payload(chunk: &Chunk, timestamp_rfc3339: &str) -> Value {
    let mut payload = chunk.metadata.clone();
    payload.insert(TEXT_KEY.into(), Value::String(chunk.text.clone()));
    payload.insert(CATEGORY_KEY.into(), category_to_value(chunk.category));
    payload.insert(
        TIMESTAMP_KEY.into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Rebuild a [`Chunk`] from a stored payload.
///
/// Returns `None` when the payload lacks a text field. The storage timestamp
/// is dropped; everything else returns to the chunk's metadata map.
pub fn payload_to_chunk(mut payload: Map<String, Value>) -> Option<Chunk> {
    let text = match payload.remove(TEXT_KEY) {
        Some(Value::String(text)) => text,
        _ => return None,
    };
    let category = payload
        .remove(CATEGORY_KEY)
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or(ChunkCategory::Uncategorized);
    payload.remove(TIMESTAMP_KEY);

    Some(Chunk {
        text,
        category,
        metadata: payload,
    })
}

fn category_to_value(category: ChunkCategory) -> Value {
    serde_json::to_value(category).unwrap_or_else(|_| Value::String("UncategorizedText".into()))
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Construct an identifier suitable for Qdrant point ids.
pub(crate) fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}
