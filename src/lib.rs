#![deny(missing_docs)]

//! Core library for the docsum server: upload a PDF, index its contents in a
//! Qdrant collection, and produce summaries or answers via a hosted LLM.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Persistent document records and file storage.
pub mod documents;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// PDF text extraction.
pub mod extract;
/// Text-generation client abstraction and adapters.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Service metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
