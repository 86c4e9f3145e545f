pub mod add_revision;
pub mod anonymize_owner;
pub mod create_document;
pub mod delete_document;
pub mod delete_revision;
pub mod history;
pub mod list_public;
pub mod read_revision;
pub mod resolve_diff;
mod retry;
pub mod soft_delete_document;
pub mod sweep_orphans;

pub use add_revision::{
    AddRevisionOperation, AddRevisionOperationOutcome, AddRevisionOperationRequest,
    AddRevisionOperationResult,
};
pub use anonymize_owner::{
    AnonymizeOwnerOperation, AnonymizeOwnerOperationRequest, AnonymizeOwnerOperationResult,
};
pub use create_document::{
    CreateDocumentOperation, CreateDocumentOperationRequest, CreateDocumentOperationResult,
    FIRST_REVISION, FIRST_REVISION_REASON, slugify,
};
pub use delete_document::{
    DeleteDocumentOperation, DeleteDocumentOperationOutcome, DeleteDocumentOperationRequest,
    DeleteDocumentOperationResult,
};
pub use delete_revision::{
    DeleteRevisionOperation, DeleteRevisionOperationOutcome, DeleteRevisionOperationRequest,
    DeleteRevisionOperationResult,
};
pub use history::{HistoryOperation, HistoryOperationOutcome, HistoryOperationRequest};
pub use list_public::{
    DEFAULT_LIST_LIMIT, ListPublicOperation, ListPublicOperationRequest,
    ListPublicOperationResult, MAX_LIST_LIMIT,
};
pub use read_revision::{
    ReadContentOperationOutcome, ReadContentOperationRequest, ReadRevisionOperation,
    ReadRevisionOperationOutcome, ReadRevisionOperationRequest, ReadRevisionOperationResult,
};
pub use resolve_diff::{
    ResolveDiffOperation, ResolveDiffOperationOutcome, ResolveDiffOperationRequest,
};
pub use soft_delete_document::{
    SoftDeleteDocumentOperation, SoftDeleteDocumentOperationOutcome,
    SoftDeleteDocumentOperationRequest,
};
pub use sweep_orphans::{
    SweepOrphansOperation, SweepOrphansOperationRequest, SweepOrphansOperationResult,
};
