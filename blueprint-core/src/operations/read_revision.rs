use crate::access::Visibility;
use crate::storage::{
    Database, Document, DocumentStore, RevisionLedger, RevisionRecord, ShardedBlobStore,
    verify_hash,
};
use crate::{BlueprintError, Result};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

#[derive(Clone)]
pub struct ReadRevisionOperation {
    db: Arc<Database>,
    blob_store: Arc<ShardedBlobStore>,
}

#[derive(Debug, Clone)]
pub struct ReadRevisionOperationRequest {
    pub storage_key: String,
    /// Defaults to the document's current revision.
    pub revision: Option<i64>,
    pub viewer: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ReadRevisionOperationResult {
    pub document: Document,
    pub revision: RevisionRecord,
    pub content: Bytes,
}

#[derive(Debug, Clone)]
pub enum ReadRevisionOperationOutcome {
    Found(ReadRevisionOperationResult),
    NotFound,
    Expired,
    Deleted,
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct ReadContentOperationRequest {
    pub storage_key: String,
    pub revision: i64,
}

#[derive(Debug, Clone)]
pub enum ReadContentOperationOutcome {
    Found(Bytes),
    NotFound,
}

impl ReadRevisionOperation {
    pub fn new(db: Arc<Database>, blob_store: Arc<ShardedBlobStore>) -> Self {
        Self { db, blob_store }
    }

    /// Serve a revision of a document, applying its access policy and
    /// checking the blob against the ledger checksum.
    pub fn run(
        &self,
        request: ReadRevisionOperationRequest,
    ) -> Result<ReadRevisionOperationOutcome> {
        let ReadRevisionOperationRequest {
            storage_key,
            revision,
            viewer,
        } = request;

        let conn = self.db.connection()?;
        let Some(document) = DocumentStore::new(&conn).get_by_storage_key(&storage_key)? else {
            return Ok(ReadRevisionOperationOutcome::NotFound);
        };

        match document.visibility(viewer, Utc::now()) {
            Visibility::Visible => {}
            Visibility::Expired => return Ok(ReadRevisionOperationOutcome::Expired),
            Visibility::Deleted => return Ok(ReadRevisionOperationOutcome::Deleted),
            Visibility::Forbidden => return Ok(ReadRevisionOperationOutcome::Forbidden),
        }

        let revision_number = revision.unwrap_or(document.current_revision);
        let Some(record) = RevisionLedger::new(&conn).get(document.id, revision_number)? else {
            return Ok(ReadRevisionOperationOutcome::NotFound);
        };
        drop(conn);

        let content = match self.blob_store.read(&document.storage_key, revision_number) {
            Ok(content) => content,
            Err(BlueprintError::BlobNotFound { .. }) => {
                tracing::warn!(
                    "Ledger references missing blob {}@{}",
                    document.storage_key,
                    revision_number
                );
                return Ok(ReadRevisionOperationOutcome::NotFound);
            }
            Err(error) => return Err(error),
        };

        verify_hash(&content, &record.content_sha256)?;

        Ok(ReadRevisionOperationOutcome::Found(
            ReadRevisionOperationResult {
                document,
                revision: record,
                content,
            },
        ))
    }

    /// Raw content retrieval by storage key and revision, no policy applied.
    pub fn run_content(
        &self,
        request: ReadContentOperationRequest,
    ) -> Result<ReadContentOperationOutcome> {
        match self.blob_store.read(&request.storage_key, request.revision) {
            Ok(bytes) => Ok(ReadContentOperationOutcome::Found(bytes)),
            Err(BlueprintError::BlobNotFound { .. }) => Ok(ReadContentOperationOutcome::NotFound),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Exposure;
    use crate::identifier::IdentifierGenerator;
    use crate::operations::{
        AddRevisionOperation, AddRevisionOperationRequest, CreateDocumentOperation,
        SoftDeleteDocumentOperation, SoftDeleteDocumentOperationRequest,
    };
    use crate::test_support::TestEnv;

    fn read(
        env: &TestEnv,
        storage_key: &str,
        revision: Option<i64>,
        viewer: Option<i64>,
    ) -> ReadRevisionOperationOutcome {
        ReadRevisionOperation::new(env.db.clone(), env.blob_store.clone())
            .run(ReadRevisionOperationRequest {
                storage_key: storage_key.to_string(),
                revision,
                viewer,
            })
            .unwrap()
    }

    #[test]
    fn test_reads_current_and_historical_revisions() {
        let env = TestEnv::new();
        let created = env.create("first");
        AddRevisionOperation::new(env.db.clone(), env.blob_store.clone())
            .run(AddRevisionOperationRequest {
                document_id: created.document_id,
                content: "second".to_string(),
                reason: "edit".to_string(),
                published_at: None,
            })
            .unwrap();

        let outcome = read(&env, &created.storage_key, None, None);
        let ReadRevisionOperationOutcome::Found(current) = outcome else {
            panic!("expected current revision");
        };
        assert_eq!(current.revision.revision_number, 2);
        assert_eq!(&current.content[..], b"second");

        let outcome = read(&env, &created.storage_key, Some(1), None);
        let ReadRevisionOperationOutcome::Found(old) = outcome else {
            panic!("expected first revision");
        };
        assert_eq!(&old.content[..], b"first");

        assert!(matches!(
            read(&env, &created.storage_key, Some(7), None),
            ReadRevisionOperationOutcome::NotFound
        ));
        assert!(matches!(
            read(&env, "unknown0", None, None),
            ReadRevisionOperationOutcome::NotFound
        ));
    }

    #[test]
    fn test_private_and_deleted_documents() {
        let env = TestEnv::new();
        let mut request = TestEnv::create_request("secret graph");
        request.exposure = Exposure::Private;
        let created = CreateDocumentOperation::new(
            env.db.clone(),
            env.blob_store.clone(),
            IdentifierGenerator::new(env.blob_store.clone()),
        )
        .run(request)
        .unwrap();

        assert!(matches!(
            read(&env, &created.storage_key, None, Some(2)),
            ReadRevisionOperationOutcome::Forbidden
        ));
        assert!(matches!(
            read(&env, &created.storage_key, None, Some(1)),
            ReadRevisionOperationOutcome::Found(_)
        ));

        SoftDeleteDocumentOperation::new(env.db.clone())
            .run(SoftDeleteDocumentOperationRequest {
                document_id: created.document_id,
            })
            .unwrap();
        assert!(matches!(
            read(&env, &created.storage_key, None, Some(1)),
            ReadRevisionOperationOutcome::Deleted
        ));
    }

    #[test]
    fn test_corrupted_blob_is_reported() {
        let env = TestEnv::new();
        let created = env.create("pristine");
        env.blob_store
            .write(&created.storage_key, 1, b"tampered")
            .unwrap();

        let err = ReadRevisionOperation::new(env.db.clone(), env.blob_store.clone())
            .run(ReadRevisionOperationRequest {
                storage_key: created.storage_key.clone(),
                revision: None,
                viewer: None,
            })
            .unwrap_err();
        assert!(matches!(err, BlueprintError::HashMismatch { .. }));
    }

    #[test]
    fn test_raw_content_retrieval() {
        let env = TestEnv::new();
        let created = env.create("raw bytes");
        let operation = ReadRevisionOperation::new(env.db.clone(), env.blob_store.clone());

        let outcome = operation
            .run_content(ReadContentOperationRequest {
                storage_key: created.storage_key.clone(),
                revision: 1,
            })
            .unwrap();
        assert!(matches!(
            outcome,
            ReadContentOperationOutcome::Found(ref bytes) if &bytes[..] == b"raw bytes"
        ));

        let outcome = operation
            .run_content(ReadContentOperationRequest {
                storage_key: created.storage_key,
                revision: 2,
            })
            .unwrap();
        assert!(matches!(outcome, ReadContentOperationOutcome::NotFound));
    }
}
