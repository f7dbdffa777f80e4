//! Chunk data model shared by the partitioner, formatter, and vector store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key carrying the owning patient identifier on every stored chunk.
pub const PATIENT_ID_KEY: &str = "patient_id";

/// Element categories emitted by the partitioning service.
///
/// The wire names match the Unstructured element types verbatim; anything the
/// service invents later collapses into [`ChunkCategory::Uncategorized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkCategory {
    /// Document or section title.
    Title,
    /// Running page header.
    Header,
    /// Bullet or numbered list entry.
    ListItem,
    /// Caption attached to a figure.
    FigureCaption,
    /// Mathematical formula.
    Formula,
    /// Verbatim code block.
    CodeSnippet,
    /// Tabular content flattened to text.
    Table,
    /// Running page footer.
    Footer,
    /// Bare page number.
    PageNumber,
    /// Body prose.
    NarrativeText,
    /// Anything the partitioner could not classify.
    #[serde(rename = "UncategorizedText", other)]
    Uncategorized,
}

/// One categorized unit of extracted document text plus free-form metadata.
///
/// Chunks are created by the partitioning step and never mutated afterwards,
/// except for the patient tag applied just before storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Extracted text content.
    pub text: String,
    /// Category assigned by the partitioner.
    pub category: ChunkCategory,
    /// Free-form metadata carried through to the vector store payload.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Chunk {
    /// Construct a chunk with empty metadata.
    pub fn new(text: impl Into<String>, category: ChunkCategory) -> Self {
        Self {
            text: text.into(),
            category,
            metadata: Map::new(),
        }
    }

    /// Record the owning patient in the chunk metadata prior to storage.
    pub fn tag_patient(&mut self, patient_id: &str) {
        self.metadata.insert(
            PATIENT_ID_KEY.to_string(),
            Value::String(patient_id.to_string()),
        );
    }

    /// Patient identifier recorded on this chunk, if any.
    pub fn patient_id(&self) -> Option<&str> {
        self.metadata.get(PATIENT_ID_KEY).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_round_trips_wire_names() {
        let value = serde_json::to_value(ChunkCategory::NarrativeText).unwrap();
        assert_eq!(value, json!("NarrativeText"));

        let parsed: ChunkCategory = serde_json::from_value(json!("FigureCaption")).unwrap();
        assert_eq!(parsed, ChunkCategory::FigureCaption);
    }

    #[test]
    fn unknown_category_becomes_uncategorized() {
        let parsed: ChunkCategory = serde_json::from_value(json!("BrandNewElement")).unwrap();
        assert_eq!(parsed, ChunkCategory::Uncategorized);

        let value = serde_json::to_value(ChunkCategory::Uncategorized).unwrap();
        assert_eq!(value, json!("UncategorizedText"));
    }

    #[test]
    fn tag_patient_sets_metadata_key() {
        let mut chunk = Chunk::new("Patient is stable.", ChunkCategory::NarrativeText);
        assert!(chunk.patient_id().is_none());

        chunk.tag_patient("patient-7");
        assert_eq!(chunk.patient_id(), Some("patient-7"));
        assert_eq!(chunk.metadata[PATIENT_ID_KEY], json!("patient-7"));
    }
}
