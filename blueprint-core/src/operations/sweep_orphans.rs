use crate::storage::{Database, RevisionLedger, ShardedBlobStore};
use crate::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Reconciles the blob tree against the ledger.
///
/// Blob deletes happen after the relational commit and blob writes happen
/// before it, so a crash in between leaves files no ledger row points at.
/// The sweep removes them once they are older than the grace period; younger
/// files may belong to a transaction that has not committed yet.
#[derive(Clone)]
pub struct SweepOrphansOperation {
    db: Arc<Database>,
    blob_store: Arc<ShardedBlobStore>,
}

#[derive(Debug, Clone)]
pub struct SweepOrphansOperationRequest {
    pub grace_period: Duration,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepOrphansOperationResult {
    pub scanned: usize,
    pub orphaned_blobs_removed: usize,
    pub staging_files_removed: usize,
    /// Orphans still inside the grace period.
    pub orphans_deferred: usize,
    pub unrecognized: usize,
}

impl SweepOrphansOperation {
    pub fn new(db: Arc<Database>, blob_store: Arc<ShardedBlobStore>) -> Self {
        Self { db, blob_store }
    }

    pub fn run(&self, request: SweepOrphansOperationRequest) -> Result<SweepOrphansOperationResult> {
        let now = SystemTime::now();

        // Rows committed after this snapshot have fresh blobs, which the
        // grace period protects.
        let references = {
            let conn = self.db.connection()?;
            RevisionLedger::new(&conn).blob_references()?
        };
        let listing = self.blob_store.list_all()?;

        let mut result = SweepOrphansOperationResult {
            scanned: listing.blobs.len(),
            unrecognized: listing.unrecognized.len(),
            ..Default::default()
        };
        let mut touched_keys = BTreeSet::new();

        for blob in &listing.blobs {
            let key = (blob.storage_key.to_ascii_lowercase(), blob.revision);
            if references.contains(&key) {
                continue;
            }

            if !is_older_than(blob.modified, now, request.grace_period) {
                result.orphans_deferred += 1;
                continue;
            }

            if request.dry_run {
                tracing::info!(
                    "Would remove orphan blob {}@{}",
                    blob.storage_key,
                    blob.revision
                );
                result.orphaned_blobs_removed += 1;
                continue;
            }

            match self.blob_store.delete(&blob.storage_key, blob.revision) {
                Ok(true) => {
                    result.orphaned_blobs_removed += 1;
                    touched_keys.insert(blob.storage_key.clone());
                }
                Ok(false) => {}
                Err(error) => tracing::warn!(
                    "Failed to remove orphan blob {}@{}: {}",
                    blob.storage_key,
                    blob.revision,
                    error
                ),
            }
        }

        for path in &listing.staging_files {
            if !staging_file_expired(path, now, request.grace_period) {
                continue;
            }
            if request.dry_run {
                tracing::info!("Would remove staging file {}", path.display());
                result.staging_files_removed += 1;
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => result.staging_files_removed += 1,
                Err(error) => tracing::warn!(
                    "Failed to remove staging file {}: {}",
                    path.display(),
                    error
                ),
            }
        }

        for path in &listing.unrecognized {
            tracing::warn!("Unrecognized file in blob tree: {}", path.display());
        }

        for storage_key in &touched_keys {
            if let Err(error) = self.blob_store.prune(storage_key) {
                tracing::warn!("Failed to prune directories for {}: {}", storage_key, error);
            }
        }

        tracing::info!(
            "Sweep finished: scanned={} removed={} staging={} deferred={} unrecognized={} dry_run={}",
            result.scanned,
            result.orphaned_blobs_removed,
            result.staging_files_removed,
            result.orphans_deferred,
            result.unrecognized,
            request.dry_run
        );

        Ok(result)
    }
}

fn is_older_than(modified: SystemTime, now: SystemTime, grace_period: Duration) -> bool {
    // Timestamps from the future count as fresh
    now.duration_since(modified)
        .map(|age| age >= grace_period)
        .unwrap_or(false)
}

fn staging_file_expired(path: &Path, now: SystemTime, grace_period: Duration) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map(|modified| is_older_than(modified, now, grace_period))
        .unwrap_or(false)
}
