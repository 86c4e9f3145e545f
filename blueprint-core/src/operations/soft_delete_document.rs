use crate::storage::{Database, DocumentStore};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct SoftDeleteDocumentOperation {
    db: Arc<Database>,
}

#[derive(Debug, Clone)]
pub struct SoftDeleteDocumentOperationRequest {
    pub document_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftDeleteDocumentOperationOutcome {
    SoftDeleted,
    AlreadyDeleted,
    DocumentNotFound,
}

impl SoftDeleteDocumentOperation {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Mark a document deleted while keeping its ledger and blobs.
    pub fn run(
        &self,
        request: SoftDeleteDocumentOperationRequest,
    ) -> Result<SoftDeleteDocumentOperationOutcome> {
        let conn = self.db.connection()?;
        let documents = DocumentStore::new(&conn);

        if documents.soft_delete(request.document_id, Utc::now())? {
            tracing::info!("Soft deleted document {}", request.document_id);
            return Ok(SoftDeleteDocumentOperationOutcome::SoftDeleted);
        }

        match documents.get(request.document_id)? {
            Some(_) => Ok(SoftDeleteDocumentOperationOutcome::AlreadyDeleted),
            None => Ok(SoftDeleteDocumentOperationOutcome::DocumentNotFound),
        }
    }
}
