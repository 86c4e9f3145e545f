use crate::access::{Exposure, Expiration};
use crate::identifier::IdentifierGenerator;
use crate::operations::{
    CreateDocumentOperation, CreateDocumentOperationRequest, CreateDocumentOperationResult,
};
use crate::storage::{Database, Document, DocumentStore, RevisionLedger, RevisionRecord, ShardedBlobStore};
use std::sync::Arc;

pub(crate) struct TestEnv {
    _temp_dir: tempfile::TempDir,
    pub db: Arc<Database>,
    pub blob_store: Arc<ShardedBlobStore>,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(temp_dir.path().join("blueprint.db")).unwrap());
        let blob_store =
            Arc::new(ShardedBlobStore::new(temp_dir.path().join("blueprints")).unwrap());
        Self {
            _temp_dir: temp_dir,
            db,
            blob_store,
        }
    }

    pub fn create_request(content: &str) -> CreateDocumentOperationRequest {
        CreateDocumentOperationRequest {
            content: content.to_string(),
            title: "Test Blueprint".to_string(),
            exposure: Exposure::Public,
            expiration: Expiration::Never,
            engine_version: Some("5.4".to_string()),
            owner_id: Some(1),
            published_at: None,
        }
    }

    pub fn create(&self, content: &str) -> CreateDocumentOperationResult {
        CreateDocumentOperation::new(
            self.db.clone(),
            self.blob_store.clone(),
            IdentifierGenerator::new(self.blob_store.clone()),
        )
        .run(Self::create_request(content))
        .unwrap()
    }

    pub fn document(&self, id: i64) -> Option<Document> {
        let conn = self.db.connection().unwrap();
        DocumentStore::new(&conn).get(id).unwrap()
    }

    pub fn revisions(&self, id: i64) -> Vec<RevisionRecord> {
        let conn = self.db.connection().unwrap();
        RevisionLedger::new(&conn).list_revisions(id).unwrap()
    }

    pub fn revision_numbers(&self, id: i64) -> Vec<i64> {
        self.revisions(id)
            .iter()
            .map(|r| r.revision_number)
            .collect()
    }
}
