use crate::storage::{Database, DocumentStore, RevisionLedger, ShardedBlobStore};
use crate::{BlueprintError, Result};
use chrono::Utc;
use rusqlite::TransactionBehavior;
use std::sync::Arc;

#[derive(Clone)]
pub struct DeleteRevisionOperation {
    db: Arc<Database>,
    blob_store: Arc<ShardedBlobStore>,
}

#[derive(Debug, Clone)]
pub struct DeleteRevisionOperationRequest {
    pub document_id: i64,
    pub revision_number: i64,
}

#[derive(Debug, Clone)]
pub struct DeleteRevisionOperationResult {
    pub document_id: i64,
    pub revision_number: i64,
    pub current_revision: i64,
    pub repointed: bool,
}

#[derive(Debug, Clone)]
pub enum DeleteRevisionOperationOutcome {
    Deleted(DeleteRevisionOperationResult),
    /// The revision is the only one left; nothing was changed.
    RefusedLastRevision,
    RevisionNotFound,
    DocumentNotFound,
}

impl DeleteRevisionOperation {
    pub fn new(db: Arc<Database>, blob_store: Arc<ShardedBlobStore>) -> Self {
        Self { db, blob_store }
    }

    pub fn run(
        &self,
        request: DeleteRevisionOperationRequest,
    ) -> Result<DeleteRevisionOperationOutcome> {
        let DeleteRevisionOperationRequest {
            document_id,
            revision_number,
        } = request;

        let mut conn = self.db.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let documents = DocumentStore::new(&tx);
        let document = match documents.get(document_id)? {
            Some(doc) if !doc.is_deleted() => doc,
            _ => return Ok(DeleteRevisionOperationOutcome::DocumentNotFound),
        };

        let ledger = RevisionLedger::new(&tx);
        let revisions = ledger.list_revisions(document_id)?;

        if revisions.is_empty() {
            return Err(BlueprintError::NoRevisions(document_id));
        }
        if revisions.len() == 1 {
            return Ok(DeleteRevisionOperationOutcome::RefusedLastRevision);
        }

        let Some(index) = revisions
            .iter()
            .position(|r| r.revision_number == revision_number)
        else {
            return Ok(DeleteRevisionOperationOutcome::RevisionNotFound);
        };

        ledger.delete(document_id, revision_number)?;

        // Deleting the current revision moves the pointer to the newest
        // survivor: the next entry if the newest went, else the newest.
        let mut current_revision = document.current_revision;
        let repointed = document.current_revision == revision_number;
        if repointed {
            let survivor = if index == 0 { &revisions[1] } else { &revisions[0] };
            current_revision = survivor.revision_number;
            documents.set_current_revision(document_id, current_revision, Utc::now())?;
        }

        tx.commit()?;

        if repointed {
            tracing::info!(
                "Document {} repointed from revision {} to {}",
                document_id,
                revision_number,
                current_revision
            );
        }

        // Once the ledger no longer references the blob it is inert, so a
        // failed removal is left for the orphan sweep.
        if let Err(error) = self.blob_store.delete(&document.storage_key, revision_number) {
            tracing::warn!(
                "Failed to delete blob {}@{}; leaving orphan: {}",
                document.storage_key,
                revision_number,
                error
            );
        }

        Ok(DeleteRevisionOperationOutcome::Deleted(
            DeleteRevisionOperationResult {
                document_id,
                revision_number,
                current_revision,
                repointed,
            },
        ))
    }
}
