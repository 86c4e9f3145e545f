use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlueprintError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The storage key space could not produce an unused key. Operators need
    /// to look at how full the blob tree is; callers must not retry.
    #[error("Storage key allocation exhausted after {attempts} attempts")]
    AllocationExhausted { attempts: usize },

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Blob not found: {storage_key}@{revision}")]
    BlobNotFound { storage_key: String, revision: i64 },

    #[error("Document {0} has no revisions")]
    NoRevisions(i64),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BlueprintError>;

impl BlueprintError {
    /// True when the error is a UNIQUE constraint violation raised by SQLite.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            BlueprintError::Database(rusqlite::Error::SqliteFailure(err, _)) => {
                err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            }
            _ => false,
        }
    }

    /// True for conditions the caller can surface as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BlueprintError::DocumentNotFound(_)
                | BlueprintError::BlobNotFound { .. }
                | BlueprintError::NoRevisions(_)
        )
    }
}
