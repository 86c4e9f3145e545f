//! Storage modules for Blueprint
//!
//! Provides the sharded blob tree and the SQLite-backed document and
//! revision tables.

pub mod blob_store;
pub mod database;
pub mod document_store;
pub mod revision_ledger;

pub use blob_store::{BlobTreeListing, ShardedBlobStore, StoredBlob};
pub use database::Database;
pub use document_store::{Document, DocumentStore, NewDocument};
pub use revision_ledger::{NewRevision, RevisionLedger, RevisionRecord};

use crate::error::{BlueprintError, Result};
use sha2::{Digest, Sha256};

/// Compute SHA256 hash of data
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that data matches the expected hash
pub fn verify_hash(data: &[u8], expected_hash: &str) -> Result<()> {
    let actual_hash = compute_hash(data);
    if actual_hash != expected_hash {
        return Err(BlueprintError::HashMismatch {
            expected: expected_hash.to_string(),
            actual: actual_hash,
        });
    }
    Ok(())
}
