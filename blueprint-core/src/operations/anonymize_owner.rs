use crate::storage::{Database, DocumentStore};
use crate::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct AnonymizeOwnerOperation {
    db: Arc<Database>,
}

#[derive(Debug, Clone)]
pub struct AnonymizeOwnerOperationRequest {
    pub owner_id: i64,
}

#[derive(Debug, Clone)]
pub struct AnonymizeOwnerOperationResult {
    pub documents_updated: usize,
}

impl AnonymizeOwnerOperation {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Called when an account is removed: its documents stay, ownerless.
    pub fn run(
        &self,
        request: AnonymizeOwnerOperationRequest,
    ) -> Result<AnonymizeOwnerOperationResult> {
        let conn = self.db.connection()?;
        let documents_updated = DocumentStore::new(&conn).anonymize_owner(request.owner_id)?;

        tracing::info!(
            "Anonymized {} documents of owner {}",
            documents_updated,
            request.owner_id
        );

        Ok(AnonymizeOwnerOperationResult { documents_updated })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestEnv;

    #[test]
    fn test_anonymize_owner() {
        let env = TestEnv::new();
        let first = env.create("one");
        let second = env.create("two");

        let result = AnonymizeOwnerOperation::new(env.db.clone())
            .run(AnonymizeOwnerOperationRequest { owner_id: 1 })
            .unwrap();

        assert_eq!(result.documents_updated, 2);
        assert_eq!(env.document(first.document_id).unwrap().owner_id, None);
        assert_eq!(env.document(second.document_id).unwrap().owner_id, None);
        // Content survives the owner
        assert!(env.blob_store.exists(&first.storage_key, 1).unwrap());
    }
}
