use calcgraph_core::CoreError;
use calcgraph_storage::StorageError;
use thiserror::Error;

use crate::verify::ComputeError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("compute error: {0}")]
    Compute(#[from] ComputeError),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}
