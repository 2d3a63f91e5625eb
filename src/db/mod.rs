pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Record store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored record could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl DatabaseError {
    /// Map a write failure, folding "disk full" and "cannot open" into
    /// `StorageUnavailable` so callers can show one blocking message.
    pub(crate) fn from_write(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match err.sqlite_error_code() {
            Some(ErrorCode::DiskFull) => Self::StorageUnavailable("storage is full".into()),
            Some(ErrorCode::CannotOpen) | Some(ErrorCode::ReadOnly) => {
                Self::StorageUnavailable(err.to_string())
            }
            _ => Self::Sqlite(err),
        }
    }
}
