use crate::storage::{
    Database, DocumentStore, NewRevision, RevisionLedger, ShardedBlobStore, compute_hash,
};
use crate::operations::retry::retry_on_unique_violation;
use crate::{BlueprintError, Result};
use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use std::sync::Arc;

#[derive(Clone)]
pub struct AddRevisionOperation {
    db: Arc<Database>,
    blob_store: Arc<ShardedBlobStore>,
}

#[derive(Debug, Clone)]
pub struct AddRevisionOperationRequest {
    pub document_id: i64,
    pub content: String,
    pub reason: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AddRevisionOperationResult {
    pub document_id: i64,
    pub storage_key: String,
    pub revision_number: i64,
}

#[derive(Debug, Clone)]
pub enum AddRevisionOperationOutcome {
    Added(AddRevisionOperationResult),
    DocumentNotFound,
}

impl AddRevisionOperation {
    pub fn new(db: Arc<Database>, blob_store: Arc<ShardedBlobStore>) -> Self {
        Self { db, blob_store }
    }

    pub fn run(&self, request: AddRevisionOperationRequest) -> Result<AddRevisionOperationOutcome> {
        if request.content.trim().is_empty() {
            return Err(BlueprintError::InvalidRequest(
                "content cannot be empty".to_string(),
            ));
        }

        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(BlueprintError::InvalidRequest(
                "revision reason cannot be empty".to_string(),
            ));
        }

        let what = format!("Revision append on document {}", request.document_id);
        retry_on_unique_violation(&what, || self.try_append(&request, reason))
    }

    fn try_append(
        &self,
        request: &AddRevisionOperationRequest,
        reason: &str,
    ) -> Result<AddRevisionOperationOutcome> {
        let mut conn = self.db.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let documents = DocumentStore::new(&tx);
        let document = match documents.get(request.document_id)? {
            Some(doc) if !doc.is_deleted() => doc,
            _ => return Ok(AddRevisionOperationOutcome::DocumentNotFound),
        };

        let ledger = RevisionLedger::new(&tx);
        // A deleted newest revision must not have its number handed out again
        let next = ledger
            .next_revision_number(document.id)?
            .max(document.last_revision + 1);

        let now = Utc::now();
        ledger.insert(
            document.id,
            &NewRevision {
                revision_number: next,
                reason: reason.to_string(),
                content_sha256: compute_hash(request.content.as_bytes()),
                size_bytes: request.content.len() as u64,
                created_at: now,
                published_at: request.published_at.unwrap_or(now),
            },
        )?;

        if let Err(error) =
            self.blob_store
                .write(&document.storage_key, next, request.content.as_bytes())
        {
            drop(tx);
            self.discard_blob(&document.storage_key, next);
            return Err(error);
        }

        documents.set_current_revision(document.id, next, now)?;

        if let Err(error) = tx.commit() {
            self.discard_blob(&document.storage_key, next);
            return Err(error.into());
        }

        tracing::info!(
            "Document {} advanced to revision {}",
            document.id,
            next
        );

        Ok(AddRevisionOperationOutcome::Added(AddRevisionOperationResult {
            document_id: document.id,
            storage_key: document.storage_key,
            revision_number: next,
        }))
    }

    fn discard_blob(&self, storage_key: &str, revision: i64) {
        if let Err(error) = self.blob_store.delete(storage_key, revision) {
            tracing::warn!(
                "Left orphan blob {}@{} after failed append: {}",
                storage_key,
                revision,
                error
            );
        }
    }
}
