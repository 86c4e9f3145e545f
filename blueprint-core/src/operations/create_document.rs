use crate::access::{Expiration, Exposure};
use crate::classifier::{DocumentKind, classify};
use crate::identifier::IdentifierGenerator;
use crate::operations::retry::retry_on_unique_violation;
use crate::storage::{
    Database, DocumentStore, NewDocument, NewRevision, RevisionLedger, ShardedBlobStore,
    compute_hash,
};
use crate::{BlueprintError, Result};
use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use std::sync::Arc;

pub const FIRST_REVISION: i64 = 1;
pub const FIRST_REVISION_REASON: &str = "First commit";

#[derive(Clone)]
pub struct CreateDocumentOperation {
    db: Arc<Database>,
    blob_store: Arc<ShardedBlobStore>,
    identifier: IdentifierGenerator,
}

#[derive(Debug, Clone)]
pub struct CreateDocumentOperationRequest {
    pub content: String,
    pub title: String,
    pub exposure: Exposure,
    pub expiration: Expiration,
    pub engine_version: Option<String>,
    pub owner_id: Option<i64>,
    /// Overrides the publication instant for imported history.
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateDocumentOperationResult {
    pub document_id: i64,
    pub storage_key: String,
    pub slug: String,
    pub kind: DocumentKind,
}

impl CreateDocumentOperation {
    pub fn new(
        db: Arc<Database>,
        blob_store: Arc<ShardedBlobStore>,
        identifier: IdentifierGenerator,
    ) -> Self {
        Self {
            db,
            blob_store,
            identifier,
        }
    }

    pub fn run(
        &self,
        request: CreateDocumentOperationRequest,
    ) -> Result<CreateDocumentOperationResult> {
        if request.content.trim().is_empty() {
            return Err(BlueprintError::InvalidRequest(
                "content cannot be empty".to_string(),
            ));
        }

        let title = request.title.trim();
        if title.is_empty() {
            return Err(BlueprintError::InvalidRequest(
                "title cannot be empty".to_string(),
            ));
        }

        let kind = classify(&request.content);

        retry_on_unique_violation("Document creation", || {
            self.try_insert(&request, title, kind)
        })
    }

    fn try_insert(
        &self,
        request: &CreateDocumentOperationRequest,
        title: &str,
        kind: DocumentKind,
    ) -> Result<CreateDocumentOperationResult> {
        let mut conn = self.db.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let storage_key = self.identifier.generate(&tx)?;
        let slug = slugify(title).unwrap_or_else(|| storage_key.clone());

        let now = Utc::now();
        let published_at = request.published_at.unwrap_or(now);

        let document_id = DocumentStore::new(&tx).insert(&NewDocument {
            storage_key: storage_key.clone(),
            slug: slug.clone(),
            title: title.to_string(),
            kind,
            engine_version: request
                .engine_version
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            exposure: request.exposure,
            owner_id: request.owner_id,
            expires_at: request.expiration.expires_at(now),
            created_at: now,
            published_at,
        })?;

        RevisionLedger::new(&tx).insert(
            document_id,
            &NewRevision {
                revision_number: FIRST_REVISION,
                reason: FIRST_REVISION_REASON.to_string(),
                content_sha256: compute_hash(request.content.as_bytes()),
                size_bytes: request.content.len() as u64,
                created_at: now,
                published_at,
            },
        )?;

        // The blob write is outside the transaction's guarantees; a failure
        // from here on can leave a file nothing references.
        if let Err(error) =
            self.blob_store
                .write(&storage_key, FIRST_REVISION, request.content.as_bytes())
        {
            drop(tx);
            self.discard_blob(&storage_key);
            return Err(error);
        }

        if let Err(error) = tx.commit() {
            self.discard_blob(&storage_key);
            return Err(error.into());
        }

        tracing::info!(
            "Created document {} with storage key {} ({})",
            document_id,
            storage_key,
            kind
        );

        Ok(CreateDocumentOperationResult {
            document_id,
            storage_key,
            slug,
            kind,
        })
    }

    fn discard_blob(&self, storage_key: &str) {
        if let Err(error) = self.blob_store.delete(storage_key, FIRST_REVISION) {
            tracing::warn!(
                "Left orphan blob {}@{} after failed create: {}",
                storage_key,
                FIRST_REVISION,
                error
            );
        }
    }
}

/// Lowercase ASCII slug with runs of anything else collapsed into `-`.
pub fn slugify(title: &str) -> Option<String> {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() { None } else { Some(slug) }
}
