//! Vector index abstraction used by ingestion and question answering.

use crate::qdrant::QdrantError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by vector index backends.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Qdrant request failed.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
    /// Backend rejected the request before sending it.
    #[error("Invalid index request: {0}")]
    InvalidRequest(String),
}

/// A vector and its metadata, keyed by a caller-chosen record id.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    /// Stable record identifier.
    pub id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Metadata stored alongside the vector.
    pub metadata: Map<String, Value>,
}

/// Constraints applied to similarity queries.
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    /// Only match records from this upload session.
    pub session_id: Option<String>,
    /// Only match records from this file.
    pub file_name: Option<String>,
}

impl IndexFilter {
    /// Filter scoped to one upload session.
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            file_name: None,
        }
    }
}

/// A record returned by a similarity query.
#[derive(Debug, Clone)]
pub struct IndexMatch {
    /// Record identifier, when the stored metadata carries one.
    pub record_id: Option<String>,
    /// Similarity score reported by the backend.
    pub score: f32,
    /// Stored metadata.
    pub metadata: Map<String, Value>,
}

impl IndexMatch {
    /// Chunk text stored with the record, if any.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get("text").and_then(Value::as_str)
    }
}

/// Interface implemented by vector stores.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace one vector.
    async fn upsert(&self, point: IndexPoint) -> Result<(), IndexError>;

    /// Return the `top_k` records closest to `vector` that satisfy `filter`.
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: &IndexFilter,
    ) -> Result<Vec<IndexMatch>, IndexError>;
}
