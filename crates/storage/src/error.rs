use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("import rejected: {0}")]
    ImportRejected(String),

    #[error("checksum mismatch for stored document {document_id}")]
    ChecksumMismatch { document_id: String },

    #[error("core error: {0}")]
    Core(#[from] calcgraph_core::CoreError),
}
