use rusqlite::{Connection, OptionalExtension};

use calcgraph_core::{DocumentId, Timestamp};

use crate::error::StorageError;
use crate::traits::{DocumentStore, StoredDocument};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn index_entry(
    id: Vec<u8>,
    name: String,
    saved_at: Vec<u8>,
    checksum: Vec<u8>,
) -> Result<StoredDocument, StorageError> {
    Ok(StoredDocument {
        document_id: DocumentId::from_bytes(to_array::<16>(id, "document_id")?),
        name,
        saved_at: Timestamp::from_bytes(&to_array::<12>(saved_at, "saved_at")?),
        checksum: to_array::<32>(checksum, "checksum")?,
    })
}

impl DocumentStore for SqliteStore {
    fn put(
        &mut self,
        document_id: DocumentId,
        name: &str,
        saved_at: Timestamp,
        blob: &[u8],
    ) -> Result<(), StorageError> {
        let checksum = blake3::hash(blob);
        self.conn.execute(
            "INSERT INTO documents (document_id, name, saved_at, checksum, body)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(document_id) DO UPDATE SET
                 name = excluded.name,
                 saved_at = excluded.saved_at,
                 checksum = excluded.checksum,
                 body = excluded.body",
            rusqlite::params![
                document_id.as_bytes().as_slice(),
                name,
                &saved_at.to_bytes()[..],
                checksum.as_bytes().as_slice(),
                blob,
            ],
        )?;
        Ok(())
    }

    fn get(&self, document_id: DocumentId) -> Result<Option<Vec<u8>>, StorageError> {
        let row: Option<(Vec<u8>, Vec<u8>)> = self
            .conn
            .query_row(
                "SELECT checksum, body FROM documents WHERE document_id = ?1",
                [document_id.as_bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((checksum_bytes, body)) = row else {
            return Ok(None);
        };

        let stored = to_array::<32>(checksum_bytes, "checksum")?;
        if *blake3::hash(&body).as_bytes() != stored {
            return Err(StorageError::ChecksumMismatch {
                document_id: document_id.to_string(),
            });
        }
        Ok(Some(body))
    }

    fn list(&self) -> Result<Vec<StoredDocument>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT document_id, name, saved_at, checksum FROM documents
             ORDER BY saved_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, Vec<u8>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, name, saved_at, checksum) = row?;
            out.push(index_entry(id, name, saved_at, checksum)?);
        }
        Ok(out)
    }

    fn most_recent(&self) -> Result<Option<StoredDocument>, StorageError> {
        let result = self
            .conn
            .query_row(
                "SELECT document_id, name, saved_at, checksum FROM documents
                 ORDER BY saved_at DESC, rowid DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                },
            )
            .optional()?;

        match result {
            Some((id, name, saved_at, checksum)) => {
                Ok(Some(index_entry(id, name, saved_at, checksum)?))
            }
            None => Ok(None),
        }
    }

    fn remove(&mut self, document_id: DocumentId) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM documents WHERE document_id = ?1",
            [document_id.as_bytes().as_slice()],
        )?;
        Ok(affected > 0)
    }
}
