pub mod error;
pub mod interchange;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use sqlite::SqliteStore;
pub use traits::{DocumentStore, StoredDocument};
