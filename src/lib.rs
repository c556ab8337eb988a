#![deny(missing_docs)]

//! Core library for the Summery AI study service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// PDF text extraction.
pub mod extraction;
/// Vector index abstraction shared by ingestion and retrieval.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Service activity counters.
pub mod metrics;
/// Document processing pipeline: chunking, indexing, summaries, flashcards, answers.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Text-to-speech client abstraction and adapters.
pub mod speech;
/// Document fetching by locator.
pub mod storage;
/// Generative model client abstraction and adapters.
pub mod summarization;
