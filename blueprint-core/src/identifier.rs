use crate::error::{BlueprintError, Result};
use crate::storage::{DocumentStore, ShardedBlobStore};
use rand::Rng;
use rusqlite::Connection;
use std::sync::Arc;

pub const KEY_LENGTH: usize = 8;
pub const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789-_";
pub const DEFAULT_MAX_ATTEMPTS: usize = 50;

/// Draws random storage keys and checks them against both the documents
/// table and the blob tree.
///
/// The check takes no lock. The UNIQUE constraint on `documents.storage_key`
/// is what actually guarantees uniqueness; callers retry on a violation.
#[derive(Clone)]
pub struct IdentifierGenerator {
    blob_store: Arc<ShardedBlobStore>,
    max_attempts: usize,
}

impl IdentifierGenerator {
    pub fn new(blob_store: Arc<ShardedBlobStore>) -> Self {
        Self {
            blob_store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn generate(&self, conn: &Connection) -> Result<String> {
        self.generate_with(conn, &mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, conn: &Connection, rng: &mut R) -> Result<String> {
        let documents = DocumentStore::new(conn);

        for attempt in 1..=self.max_attempts {
            let candidate = random_key(rng);

            if documents.storage_key_exists(&candidate)? {
                tracing::debug!(
                    "Storage key {} taken by a document (attempt {})",
                    candidate,
                    attempt
                );
                continue;
            }

            if self.blob_store.exists_prefix(&candidate)? {
                tracing::warn!(
                    "Storage key {} has an orphaned blob directory (attempt {})",
                    candidate,
                    attempt
                );
                continue;
            }

            return Ok(candidate);
        }

        tracing::error!(
            "Storage key allocation exhausted after {} attempts; check blob tree fill level at {:?}",
            self.max_attempts,
            self.blob_store.base_path()
        );
        Err(BlueprintError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

pub fn random_key<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..KEY_LENGTH)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}
