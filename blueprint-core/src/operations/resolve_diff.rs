use crate::storage::{Database, DocumentStore, RevisionLedger};
use crate::timeline::{DiffPair, Timeline, build_timeline};
use crate::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct ResolveDiffOperation {
    db: Arc<Database>,
}

#[derive(Debug, Clone)]
pub struct ResolveDiffOperationRequest {
    pub document_id: i64,
    pub left: i64,
    pub right: i64,
}

#[derive(Debug, Clone)]
pub enum ResolveDiffOperationOutcome {
    Resolved(Timeline),
    /// Unknown document, or one of the endpoints is not in its ledger.
    Invalid,
}

impl ResolveDiffOperation {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Validate a pair of revisions and label the document timeline for
    /// comparing them. Content is fetched separately by the caller.
    pub fn run(&self, request: ResolveDiffOperationRequest) -> Result<ResolveDiffOperationOutcome> {
        let ResolveDiffOperationRequest {
            document_id,
            left,
            right,
        } = request;

        let conn = self.db.connection()?;
        let document = match DocumentStore::new(&conn).get(document_id)? {
            Some(document) if !document.is_deleted() => document,
            _ => return Ok(ResolveDiffOperationOutcome::Invalid),
        };

        let revisions = RevisionLedger::new(&conn).list_revisions(document_id)?;
        let has = |n: i64| revisions.iter().any(|r| r.revision_number == n);
        if !has(left) || !has(right) {
            tracing::debug!(
                "Invalid diff {}..{} for document {}",
                left,
                right,
                document_id
            );
            return Ok(ResolveDiffOperationOutcome::Invalid);
        }

        Ok(ResolveDiffOperationOutcome::Resolved(build_timeline(
            document_id,
            document.current_revision,
            &revisions,
            Some(DiffPair { left, right }),
        )))
    }
}
