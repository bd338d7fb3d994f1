use thiserror::Error;

mod autosave;
mod document;
mod kv_store;
mod schema;

#[cfg(test)]
mod tests;

pub use autosave::AutosaveSlot;
pub use document::{EdgeRecord, GraphDocument, NodeRecord};
pub use kv_store::SqliteKvStore;

const SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Schema mismatch: {0}")]
    Schema(String),
    #[error("Other error: {0}")]
    Other(String),
}
