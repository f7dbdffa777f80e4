//! Qdrant vector store integration.
//!
//! A thin REST client plus helpers for building chunk payloads and the
//! patient-scoped search filter. The collection is created lazily with cosine
//! distance and a keyword index on `patient_id`, which is the sole mechanism
//! for per-patient data isolation.

mod client;
/// Search filter construction.
pub mod filters;
mod payload;
mod types;

pub use client::QdrantService;
pub use payload::{build_chunk_payload, payload_to_chunk};
pub(crate) use payload::current_timestamp_rfc3339;
pub use types::{PointInsert, QdrantError, ScoredPoint};
