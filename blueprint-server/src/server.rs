use crate::config::Config;
use blueprint_core::operations::{
    AddRevisionOperation, AddRevisionOperationOutcome, AddRevisionOperationRequest,
    AnonymizeOwnerOperation, AnonymizeOwnerOperationRequest, CreateDocumentOperation,
    CreateDocumentOperationRequest, DeleteDocumentOperation, DeleteDocumentOperationOutcome,
    DeleteDocumentOperationRequest, DeleteRevisionOperation, DeleteRevisionOperationOutcome,
    DeleteRevisionOperationRequest, HistoryOperation, HistoryOperationOutcome,
    HistoryOperationRequest, ListPublicOperation, ListPublicOperationRequest,
    ReadRevisionOperation, ReadRevisionOperationOutcome, ReadRevisionOperationRequest,
    ResolveDiffOperation, ResolveDiffOperationOutcome, ResolveDiffOperationRequest,
    SoftDeleteDocumentOperation, SoftDeleteDocumentOperationOutcome,
    SoftDeleteDocumentOperationRequest,
};
use blueprint_core::{
    BlueprintError, Database, Document, DocumentKind, Expiration, Exposure, IdentifierGenerator,
    Result, RevisionRecord, ShardedBlobStore,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct ServerState {
    pub create_document: CreateDocumentOperation,
    pub add_revision: AddRevisionOperation,
    pub delete_revision: DeleteRevisionOperation,
    pub delete_document: DeleteDocumentOperation,
    pub soft_delete_document: SoftDeleteDocumentOperation,
    pub read_revision: ReadRevisionOperation,
    pub list_public: ListPublicOperation,
    pub history: HistoryOperation,
    pub resolve_diff: ResolveDiffOperation,
    pub anonymize_owner: AnonymizeOwnerOperation,
}

impl ServerState {
    pub fn new(db: Arc<Database>, blob_store: Arc<ShardedBlobStore>, key_attempts: usize) -> Self {
        let identifier =
            IdentifierGenerator::new(blob_store.clone()).with_max_attempts(key_attempts);

        Self {
            create_document: CreateDocumentOperation::new(
                db.clone(),
                blob_store.clone(),
                identifier,
            ),
            add_revision: AddRevisionOperation::new(db.clone(), blob_store.clone()),
            delete_revision: DeleteRevisionOperation::new(db.clone(), blob_store.clone()),
            delete_document: DeleteDocumentOperation::new(db.clone(), blob_store.clone()),
            soft_delete_document: SoftDeleteDocumentOperation::new(db.clone()),
            read_revision: ReadRevisionOperation::new(db.clone(), blob_store),
            list_public: ListPublicOperation::new(db.clone()),
            history: HistoryOperation::new(db.clone()),
            resolve_diff: ResolveDiffOperation::new(db.clone()),
            anonymize_owner: AnonymizeOwnerOperation::new(db),
        }
    }
}

/// Open the ledger database and blob tree named by the storage config.
pub fn open_storage(config: &Config) -> Result<(Arc<Database>, Arc<ShardedBlobStore>)> {
    let db = Arc::new(Database::open(config.storage.database_path())?);
    let blob_store = Arc::new(ShardedBlobStore::new(config.storage.blob_dir())?);
    Ok((db, blob_store))
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateBlueprintBody {
    content: String,
    title: String,
    #[serde(default)]
    exposure: Option<Exposure>,
    #[serde(default)]
    expiration: Expiration,
    #[serde(default)]
    engine_version: Option<String>,
    #[serde(default)]
    owner_id: Option<i64>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    document_id: i64,
    storage_key: String,
    slug: String,
    kind: DocumentKind,
}

#[derive(Debug, Deserialize)]
struct AddRevisionBody {
    content: String,
    reason: String,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct RevisionAddedResponse {
    document_id: i64,
    storage_key: String,
    revision_number: i64,
}

#[derive(Debug, Deserialize)]
struct ReadQuery {
    #[serde(default)]
    revision: Option<i64>,
    #[serde(default)]
    viewer: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ViewerQuery {
    #[serde(default)]
    viewer: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct BlueprintResponse {
    document: Document,
    revision: RevisionRecord,
    content: String,
}

#[derive(Debug, Serialize)]
struct RevisionDeletedResponse {
    document_id: i64,
    revision_number: i64,
    current_revision: i64,
    repointed: bool,
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    soft: bool,
}

#[derive(Debug, Serialize)]
struct DocumentDeletedResponse {
    document_id: i64,
    soft: bool,
    revisions_removed: usize,
    blobs_removed: usize,
}

#[derive(Debug, Serialize)]
struct OwnerAnonymizedResponse {
    owner_id: i64,
    documents_updated: usize,
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/blueprints", get(list_blueprints).post(create_blueprint))
        .route(
            "/blueprints/:id",
            get(read_blueprint).delete(delete_blueprint),
        )
        .route("/blueprints/:id/revisions", post(add_revision))
        .route(
            "/blueprints/:id/revisions/:revision",
            delete(delete_revision),
        )
        .route("/blueprints/:id/history", get(history))
        .route("/blueprints/:id/diff/:left/:right", get(resolve_diff))
        .route("/blobs/:storage_key/:revision", get(read_blob))
        .route("/owners/:owner_id", delete(anonymize_owner))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<()> {
    let (db, blob_store) = open_storage(&config)?;
    tracing::info!(
        "Ledger at {:?}, blobs under {:?}",
        db.path(),
        blob_store.base_path()
    );

    let state = Arc::new(ServerState::new(db, blob_store, config.storage.key_attempts));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Run a blocking core call off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BlueprintError::Internal(format!("blocking task failed: {}", e)))?
}

fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    let resp = ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    };
    (status, Json(resp)).into_response()
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let resp = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message.into()),
    };
    (status, Json(resp)).into_response()
}

fn error_status(error: &BlueprintError) -> StatusCode {
    match error {
        BlueprintError::AllocationExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        BlueprintError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: BlueprintError) -> Response {
    let status = error_status(&error);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", error);
    }
    failure(status, error.to_string())
}

async fn health_handler() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });

    (StatusCode::OK, Json(response))
}

async fn create_blueprint(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<CreateBlueprintBody>,
) -> Response {
    let request = CreateDocumentOperationRequest {
        content: body.content,
        title: body.title,
        exposure: body.exposure.unwrap_or(Exposure::Public),
        expiration: body.expiration,
        engine_version: body.engine_version,
        owner_id: body.owner_id,
        published_at: body.published_at,
    };

    match blocking(move || state.create_document.run(request)).await {
        Ok(result) => success(
            StatusCode::CREATED,
            CreatedResponse {
                document_id: result.document_id,
                storage_key: result.storage_key,
                slug: result.slug,
                kind: result.kind,
            },
        ),
        Err(e) => error_response(e),
    }
}

async fn list_blueprints(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let request = ListPublicOperationRequest { limit: query.limit };

    match blocking(move || state.list_public.run(request)).await {
        Ok(result) => success(StatusCode::OK, result.documents),
        Err(e) => error_response(e),
    }
}

/// Response for a read the access policy turned away.
fn refused_read(outcome: &ReadRevisionOperationOutcome) -> Option<Response> {
    let response = match outcome {
        ReadRevisionOperationOutcome::Found(_) => return None,
        ReadRevisionOperationOutcome::NotFound => {
            failure(StatusCode::NOT_FOUND, "blueprint not found")
        }
        ReadRevisionOperationOutcome::Expired => {
            failure(StatusCode::GONE, "blueprint has expired")
        }
        ReadRevisionOperationOutcome::Deleted => {
            failure(StatusCode::GONE, "blueprint was deleted")
        }
        ReadRevisionOperationOutcome::Forbidden => {
            failure(StatusCode::FORBIDDEN, "blueprint is private")
        }
    };
    Some(response)
}

async fn read_blueprint(
    State(state): State<Arc<ServerState>>,
    Path(storage_key): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Response {
    let request = ReadRevisionOperationRequest {
        storage_key,
        revision: query.revision,
        viewer: query.viewer,
    };

    match blocking(move || state.read_revision.run(request)).await {
        Ok(ReadRevisionOperationOutcome::Found(found)) => success(
            StatusCode::OK,
            BlueprintResponse {
                document: found.document,
                revision: found.revision,
                content: String::from_utf8_lossy(&found.content).into_owned(),
            },
        ),
        Ok(outcome) => refused_read(&outcome)
            .unwrap_or_else(|| failure(StatusCode::NOT_FOUND, "blueprint not found")),
        Err(e) => error_response(e),
    }
}

async fn add_revision(
    State(state): State<Arc<ServerState>>,
    Path(document_id): Path<i64>,
    Json(body): Json<AddRevisionBody>,
) -> Response {
    let request = AddRevisionOperationRequest {
        document_id,
        content: body.content,
        reason: body.reason,
        published_at: body.published_at,
    };

    match blocking(move || state.add_revision.run(request)).await {
        Ok(AddRevisionOperationOutcome::Added(result)) => success(
            StatusCode::CREATED,
            RevisionAddedResponse {
                document_id: result.document_id,
                storage_key: result.storage_key,
                revision_number: result.revision_number,
            },
        ),
        Ok(AddRevisionOperationOutcome::DocumentNotFound) => {
            failure(StatusCode::NOT_FOUND, "blueprint not found")
        }
        Err(e) => error_response(e),
    }
}

async fn delete_revision(
    State(state): State<Arc<ServerState>>,
    Path((document_id, revision_number)): Path<(i64, i64)>,
) -> Response {
    let request = DeleteRevisionOperationRequest {
        document_id,
        revision_number,
    };

    match blocking(move || state.delete_revision.run(request)).await {
        Ok(DeleteRevisionOperationOutcome::Deleted(result)) => success(
            StatusCode::OK,
            RevisionDeletedResponse {
                document_id: result.document_id,
                revision_number: result.revision_number,
                current_revision: result.current_revision,
                repointed: result.repointed,
            },
        ),
        Ok(DeleteRevisionOperationOutcome::RefusedLastRevision) => {
            failure(StatusCode::CONFLICT, "cannot delete the only revision")
        }
        Ok(DeleteRevisionOperationOutcome::RevisionNotFound) => {
            failure(StatusCode::NOT_FOUND, "revision not found")
        }
        Ok(DeleteRevisionOperationOutcome::DocumentNotFound) => {
            failure(StatusCode::NOT_FOUND, "blueprint not found")
        }
        Err(e) => error_response(e),
    }
}

async fn delete_blueprint(
    State(state): State<Arc<ServerState>>,
    Path(document_id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> Response {
    if query.soft {
        let request = SoftDeleteDocumentOperationRequest { document_id };
        return match blocking(move || state.soft_delete_document.run(request)).await {
            Ok(SoftDeleteDocumentOperationOutcome::SoftDeleted)
            | Ok(SoftDeleteDocumentOperationOutcome::AlreadyDeleted) => success(
                StatusCode::OK,
                DocumentDeletedResponse {
                    document_id,
                    soft: true,
                    revisions_removed: 0,
                    blobs_removed: 0,
                },
            ),
            Ok(SoftDeleteDocumentOperationOutcome::DocumentNotFound) => {
                failure(StatusCode::NOT_FOUND, "blueprint not found")
            }
            Err(e) => error_response(e),
        };
    }

    let request = DeleteDocumentOperationRequest { document_id };
    match blocking(move || state.delete_document.run(request)).await {
        Ok(DeleteDocumentOperationOutcome::Deleted(result)) => success(
            StatusCode::OK,
            DocumentDeletedResponse {
                document_id: result.document_id,
                soft: false,
                revisions_removed: result.revisions_removed,
                blobs_removed: result.blobs_removed,
            },
        ),
        Ok(DeleteDocumentOperationOutcome::DocumentNotFound) => {
            failure(StatusCode::NOT_FOUND, "blueprint not found")
        }
        Err(e) => error_response(e),
    }
}

async fn history(
    State(state): State<Arc<ServerState>>,
    Path(document_id): Path<i64>,
) -> Response {
    let request = HistoryOperationRequest { document_id };

    match blocking(move || state.history.run(request)).await {
        Ok(HistoryOperationOutcome::Found(timeline)) => success(StatusCode::OK, timeline),
        Ok(HistoryOperationOutcome::DocumentNotFound) => {
            failure(StatusCode::NOT_FOUND, "blueprint not found")
        }
        Err(e) => error_response(e),
    }
}

async fn resolve_diff(
    State(state): State<Arc<ServerState>>,
    Path((document_id, left, right)): Path<(i64, i64, i64)>,
) -> Response {
    let request = ResolveDiffOperationRequest {
        document_id,
        left,
        right,
    };

    match blocking(move || state.resolve_diff.run(request)).await {
        Ok(ResolveDiffOperationOutcome::Resolved(timeline)) => success(StatusCode::OK, timeline),
        Ok(ResolveDiffOperationOutcome::Invalid) => {
            failure(StatusCode::NOT_FOUND, "invalid revision pair")
        }
        Err(e) => error_response(e),
    }
}

/// Raw bytes of one revision. Goes through the same policy as
/// `read_blueprint`, so knowing a storage key is not enough.
async fn read_blob(
    State(state): State<Arc<ServerState>>,
    Path((storage_key, revision)): Path<(String, i64)>,
    Query(query): Query<ViewerQuery>,
) -> Response {
    let request = ReadRevisionOperationRequest {
        storage_key,
        revision: Some(revision),
        viewer: query.viewer,
    };

    match blocking(move || state.read_revision.run(request)).await {
        Ok(ReadRevisionOperationOutcome::Found(found)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            found.content,
        )
            .into_response(),
        Ok(outcome) => refused_read(&outcome)
            .unwrap_or_else(|| failure(StatusCode::NOT_FOUND, "blob not found")),
        Err(e) => error_response(e),
    }
}

async fn anonymize_owner(
    State(state): State<Arc<ServerState>>,
    Path(owner_id): Path<i64>,
) -> Response {
    let request = AnonymizeOwnerOperationRequest { owner_id };

    match blocking(move || state.anonymize_owner.run(request)).await {
        Ok(result) => success(
            StatusCode::OK,
            OwnerAnonymizedResponse {
                owner_id,
                documents_updated: result.documents_updated,
            },
        ),
        Err(e) => error_response(e),
    }
}
