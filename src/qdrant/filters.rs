//! Filter helpers for Qdrant queries.

use serde_json::{Value, json};

use crate::index::IndexFilter;

/// Compose a Qdrant filter payload from an [`IndexFilter`].
pub fn build_index_filter(filter: &IndexFilter) -> Option<Value> {
    let mut must: Vec<Value> = Vec::new();

    if let Some(session_id) = filter.session_id.as_deref().and_then(non_empty) {
        must.push(json!({
            "key": "upload_session_id",
            "match": { "value": session_id }
        }));
    }

    if let Some(file_name) = filter.file_name.as_deref().and_then(non_empty) {
        must.push(json!({
            "key": "file_name",
            "match": { "value": file_name }
        }));
    }

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

fn non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
