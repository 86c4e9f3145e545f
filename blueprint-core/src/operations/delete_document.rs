use crate::storage::{Database, DocumentStore, RevisionLedger, ShardedBlobStore};
use crate::Result;
use rusqlite::TransactionBehavior;
use std::sync::Arc;

#[derive(Clone)]
pub struct DeleteDocumentOperation {
    db: Arc<Database>,
    blob_store: Arc<ShardedBlobStore>,
}

#[derive(Debug, Clone)]
pub struct DeleteDocumentOperationRequest {
    pub document_id: i64,
}

#[derive(Debug, Clone)]
pub struct DeleteDocumentOperationResult {
    pub document_id: i64,
    pub storage_key: String,
    pub revisions_removed: usize,
    pub blobs_removed: usize,
}

#[derive(Debug, Clone)]
pub enum DeleteDocumentOperationOutcome {
    Deleted(DeleteDocumentOperationResult),
    DocumentNotFound,
}

impl DeleteDocumentOperation {
    pub fn new(db: Arc<Database>, blob_store: Arc<ShardedBlobStore>) -> Self {
        Self { db, blob_store }
    }

    /// Remove a document, its ledger rows and its blobs. Soft-deleted
    /// documents can still be removed this way.
    pub fn run(
        &self,
        request: DeleteDocumentOperationRequest,
    ) -> Result<DeleteDocumentOperationOutcome> {
        let document_id = request.document_id;

        let mut conn = self.db.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let documents = DocumentStore::new(&tx);
        let Some(document) = documents.get(document_id)? else {
            return Ok(DeleteDocumentOperationOutcome::DocumentNotFound);
        };

        let ledger = RevisionLedger::new(&tx);
        let revisions = ledger.list_revisions(document_id)?;
        let revisions_removed = ledger.delete_all(document_id)?;
        documents.delete(document_id)?;
        tx.commit()?;

        // Relational rows are gone; anything that fails below is an orphan.
        let mut blobs_removed = 0usize;
        for revision in &revisions {
            match self
                .blob_store
                .delete(&document.storage_key, revision.revision_number)
            {
                Ok(true) => blobs_removed += 1,
                Ok(false) => tracing::warn!(
                    "Blob {}@{} was already missing",
                    document.storage_key,
                    revision.revision_number
                ),
                Err(error) => tracing::warn!(
                    "Failed to delete blob {}@{}; leaving orphan: {}",
                    document.storage_key,
                    revision.revision_number,
                    error
                ),
            }
        }

        // Picks up blobs left behind by earlier partial failures
        match self.blob_store.delete_all(&document.storage_key) {
            Ok(extra) => blobs_removed += extra,
            Err(error) => tracing::warn!(
                "Failed to sweep blobs for {}: {}",
                document.storage_key,
                error
            ),
        }

        if let Err(error) = self.blob_store.prune(&document.storage_key) {
            tracing::warn!(
                "Failed to prune directories for {}: {}",
                document.storage_key,
                error
            );
        }

        tracing::info!(
            "Deleted document {} ({}): {} revisions, {} blobs",
            document_id,
            document.storage_key,
            revisions_removed,
            blobs_removed
        );

        Ok(DeleteDocumentOperationOutcome::Deleted(
            DeleteDocumentOperationResult {
                document_id,
                storage_key: document.storage_key,
                revisions_removed,
                blobs_removed,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{AddRevisionOperation, AddRevisionOperationRequest};
    use crate::test_support::TestEnv;

    #[test]
    fn test_delete_document_removes_everything() {
        let env = TestEnv::new();
        let created = env.create("one");
        AddRevisionOperation::new(env.db.clone(), env.blob_store.clone())
            .run(AddRevisionOperationRequest {
                document_id: created.document_id,
                content: "two".to_string(),
                reason: "second".to_string(),
                published_at: None,
            })
            .unwrap();
        // A stray blob from an earlier failed append
        env.blob_store.write(&created.storage_key, 9, b"orphan").unwrap();

        let operation = DeleteDocumentOperation::new(env.db.clone(), env.blob_store.clone());
        let outcome = operation
            .run(DeleteDocumentOperationRequest {
                document_id: created.document_id,
            })
            .unwrap();

        let DeleteDocumentOperationOutcome::Deleted(result) = outcome else {
            panic!("expected deletion");
        };
        assert_eq!(result.revisions_removed, 2);
        assert_eq!(result.blobs_removed, 3);

        assert!(env.document(created.document_id).is_none());
        assert!(env.revisions(created.document_id).is_empty());
        assert!(!env.blob_store.exists_prefix(&created.storage_key).unwrap());

        assert!(matches!(
            operation
                .run(DeleteDocumentOperationRequest {
                    document_id: created.document_id,
                })
                .unwrap(),
            DeleteDocumentOperationOutcome::DocumentNotFound
        ));
    }
}
