use calcgraph_core::{DocumentId, Timestamp};

use crate::error::StorageError;

/// Index entry for one stored document blob.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub document_id: DocumentId,
    pub name: String,
    pub saved_at: Timestamp,
    pub checksum: [u8; 32],
}

/// Key-value persistence for document blobs, keyed by document id, with
/// an index supporting "load most recent". The blob is opaque here; the
/// interchange module owns its shape.
pub trait DocumentStore {
    /// Insert or replace the blob stored under `document_id`.
    fn put(
        &mut self,
        document_id: DocumentId,
        name: &str,
        saved_at: Timestamp,
        blob: &[u8],
    ) -> Result<(), StorageError>;

    /// Fetch a blob, verifying its checksum. Absent key is `Ok(None)`;
    /// a corrupt blob is an error, never silently returned.
    fn get(&self, document_id: DocumentId) -> Result<Option<Vec<u8>>, StorageError>;

    /// Index of all stored documents, most recently saved first.
    fn list(&self) -> Result<Vec<StoredDocument>, StorageError>;

    /// The most recently saved document, if the store is non-empty.
    fn most_recent(&self) -> Result<Option<StoredDocument>, StorageError>;

    /// Remove a stored document. Returns whether anything was removed.
    fn remove(&mut self, document_id: DocumentId) -> Result<bool, StorageError>;
}
