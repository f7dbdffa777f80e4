//! Filter helpers for Qdrant search queries.

use crate::chunk::PATIENT_ID_KEY;
use serde_json::{Value, json};

/// Compose the payload filter that scopes a search to one patient.
///
/// Every stored chunk carries a `patient_id` payload field; matching on it is
/// the only access-control boundary between patients.
pub fn patient_filter(patient_id: &str) -> Value {
    json!({
        "must": [
            {
                "key": PATIENT_ID_KEY,
                "match": { "value": patient_id }
            }
        ]
    })
}
