//! The persisted document interchange format.
//!
//! A `.worksheet` blob is a JSON object with a top-level `schemaVersion`
//! and the document under `document`. Importers also accept a bare
//! document object (the legacy shape). Anything without a non-empty `id`
//! and an array-valued `nodes` field is rejected before any state is
//! touched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use calcgraph_core::WorksheetDocument;

use crate::error::StorageError;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "schemaVersion")]
    schema_version: u32,
    document: WorksheetDocument,
}

/// Serialize a document into the current interchange envelope.
pub fn encode(document: &WorksheetDocument) -> Result<Vec<u8>, StorageError> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        document: document.clone(),
    };
    serde_json::to_vec_pretty(&envelope).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Parse an interchange blob, accepting the envelope or a bare legacy
/// document. Validation happens on the raw JSON, so a malformed blob is
/// rejected without constructing any document state.
pub fn decode(bytes: &[u8]) -> Result<WorksheetDocument, StorageError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| StorageError::ImportRejected(format!("not valid JSON: {e}")))?;

    let doc_value = match &value {
        Value::Object(map) if map.contains_key("schemaVersion") => {
            let version = map
                .get("schemaVersion")
                .and_then(Value::as_u64)
                .ok_or_else(|| {
                    StorageError::ImportRejected("schemaVersion is not an integer".to_string())
                })?;
            if version > SCHEMA_VERSION as u64 {
                return Err(StorageError::ImportRejected(format!(
                    "unsupported schemaVersion {version} (max {SCHEMA_VERSION})"
                )));
            }
            map.get("document").ok_or_else(|| {
                StorageError::ImportRejected("envelope has no document field".to_string())
            })?
        }
        _ => &value,
    };

    validate_document_shape(doc_value)?;

    serde_json::from_value(doc_value.clone())
        .map_err(|e| StorageError::ImportRejected(format!("document does not parse: {e}")))
}

fn validate_document_shape(value: &Value) -> Result<(), StorageError> {
    let obj = value
        .as_object()
        .ok_or_else(|| StorageError::ImportRejected("document is not an object".to_string()))?;

    match obj.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => {}
        _ => {
            return Err(StorageError::ImportRejected(
                "document has no non-empty id".to_string(),
            ))
        }
    }

    if !obj.get("nodes").is_some_and(Value::is_array) {
        return Err(StorageError::ImportRejected(
            "document has no nodes array".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcgraph_core::MonotonicClock;

    fn sample_document() -> WorksheetDocument {
        let mut clock = MonotonicClock::new();
        WorksheetDocument::new("interchange sample", &mut clock)
    }

    #[test]
    fn envelope_roundtrip() {
        let doc = sample_document();
        let bytes = encode(&doc).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn envelope_carries_schema_version() {
        let bytes = encode(&sample_document()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["schemaVersion"], SCHEMA_VERSION);
        assert!(value["document"].is_object());
    }

    #[test]
    fn bare_legacy_document_is_accepted() {
        let doc = sample_document();
        let bare = serde_json::to_vec(&doc).unwrap();
        let back = decode(&bare).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            decode(b"not json at all"),
            Err(StorageError::ImportRejected(_))
        ));
    }

    #[test]
    fn missing_id_is_rejected() {
        let bytes = br#"{"name": "x", "nodes": []}"#;
        assert!(matches!(
            decode(bytes),
            Err(StorageError::ImportRejected(_))
        ));
    }

    #[test]
    fn empty_id_is_rejected() {
        let bytes = br#"{"id": "", "nodes": []}"#;
        assert!(matches!(
            decode(bytes),
            Err(StorageError::ImportRejected(_))
        ));
    }

    #[test]
    fn non_array_nodes_is_rejected() {
        let bytes = br#"{"id": "abc", "nodes": {"0": {}}}"#;
        assert!(matches!(
            decode(bytes),
            Err(StorageError::ImportRejected(_))
        ));
    }

    #[test]
    fn scalar_payload_is_rejected() {
        assert!(matches!(
            decode(b"42"),
            Err(StorageError::ImportRejected(_))
        ));
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let doc = sample_document();
        let mut value = serde_json::to_value(Envelope {
            schema_version: SCHEMA_VERSION,
            document: doc,
        })
        .unwrap();
        value["schemaVersion"] = Value::from(SCHEMA_VERSION + 1);
        let bytes = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(StorageError::ImportRejected(_))
        ));
    }
}
