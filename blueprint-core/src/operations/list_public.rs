use crate::storage::{Database, Document, DocumentStore};
use crate::{BlueprintError, Result};
use chrono::Utc;
use std::sync::Arc;

pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 100;

#[derive(Clone)]
pub struct ListPublicOperation {
    db: Arc<Database>,
}

#[derive(Debug, Clone)]
pub struct ListPublicOperationRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ListPublicOperationResult {
    pub documents: Vec<Document>,
}

impl ListPublicOperation {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Public, live, unexpired documents, newest publication first.
    /// Unlisted and private documents never appear here.
    pub fn run(&self, request: ListPublicOperationRequest) -> Result<ListPublicOperationResult> {
        let limit = request.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if limit == 0 || limit > MAX_LIST_LIMIT {
            return Err(BlueprintError::InvalidRequest(format!(
                "limit must be between 1 and {}",
                MAX_LIST_LIMIT
            )));
        }

        let conn = self.db.connection()?;
        let documents = DocumentStore::new(&conn).list_public(limit, Utc::now())?;
        Ok(ListPublicOperationResult { documents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Exposure;
    use crate::identifier::IdentifierGenerator;
    use crate::operations::{
        CreateDocumentOperation, SoftDeleteDocumentOperation, SoftDeleteDocumentOperationRequest,
    };
    use crate::test_support::TestEnv;

    fn create_with(env: &TestEnv, content: &str, exposure: Exposure) -> i64 {
        let mut request = TestEnv::create_request(content);
        request.exposure = exposure;
        CreateDocumentOperation::new(
            env.db.clone(),
            env.blob_store.clone(),
            IdentifierGenerator::new(env.blob_store.clone()),
        )
        .run(request)
        .unwrap()
        .document_id
    }

    #[test]
    fn test_lists_only_public_live_documents() {
        let env = TestEnv::new();
        let first = create_with(&env, "one", Exposure::Public);
        create_with(&env, "hidden", Exposure::Unlisted);
        create_with(&env, "mine", Exposure::Private);
        let gone = create_with(&env, "gone", Exposure::Public);
        let last = create_with(&env, "two", Exposure::Public);

        SoftDeleteDocumentOperation::new(env.db.clone())
            .run(SoftDeleteDocumentOperationRequest { document_id: gone })
            .unwrap();

        let operation = ListPublicOperation::new(env.db.clone());
        let listed = operation
            .run(ListPublicOperationRequest { limit: None })
            .unwrap();
        let ids: Vec<i64> = listed.documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![last, first]);

        let listed = operation
            .run(ListPublicOperationRequest { limit: Some(1) })
            .unwrap();
        assert_eq!(listed.documents.len(), 1);
    }

    #[test]
    fn test_rejects_out_of_range_limit() {
        let env = TestEnv::new();
        let operation = ListPublicOperation::new(env.db.clone());
        for limit in [0, MAX_LIST_LIMIT + 1] {
            let err = operation
                .run(ListPublicOperationRequest { limit: Some(limit) })
                .unwrap_err();
            assert!(matches!(err, BlueprintError::InvalidRequest(_)));
        }
    }
}
