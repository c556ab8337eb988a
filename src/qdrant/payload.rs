//! Helpers for constructing and hashing Qdrant payloads.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload stored alongside an indexed record.
///
/// Caller metadata is kept as-is; `record_id` and `timestamp` are added, and `chunk_hash` is
/// computed from `text` when the caller did not supply one.
pub(crate) fn build_payload(
    record_id: &str,
    metadata: &Map<String, Value>,
    timestamp_rfc3339: &str,
) -> Value {
    let mut payload = metadata.clone();
    payload.insert("record_id".into(), Value::String(record_id.to_string()));
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );

    if !payload.contains_key("chunk_hash")
        && let Some(text) = metadata.get("text").and_then(Value::as_str)
    {
        payload.insert("chunk_hash".into(), Value::String(compute_chunk_hash(text)));
    }

    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Qdrant point ids must be UUIDs or integers; derive a stable UUID from the record id.
pub fn point_id(record_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes())
}
