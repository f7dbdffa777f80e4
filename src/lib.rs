#![deny(missing_docs)]

//! Core library for the medsift clinical document extraction service.

/// HTTP routing, REST handlers, and the background processing job.
pub mod api;
/// Chunk data model shared across the pipeline.
pub mod chunk;
/// Environment-driven configuration management.
pub mod config;
/// Extraction orchestrator and structured output types.
pub mod extraction;
/// FHIR R4 subset for structured clinical data.
pub mod fhir;
/// OpenAI chat and embeddings clients.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Chunk-to-markdown rendering.
pub mod markdown;
/// Document partitioning service client.
pub mod partition;
/// Qdrant vector store integration.
pub mod qdrant;
/// Pipeline service seam consumed by the HTTP surface.
pub mod service;
/// Patient-scoped chunk storage.
pub mod store;
/// Suggestion orchestrator.
pub mod suggestion;
