//! Blueprint Core - versioned content store for shared blueprint text
//!
//! Each document gets an opaque storage key and a linear history of
//! revisions, kept in two places:
//! - a SQLite ledger of documents and revision records
//! - a sharded file tree with one blob per revision
//!
//! Operations keep the two consistent across create, append and delete, and
//! resolve revision pairs into day-grouped timelines for diffing.

pub mod access;
pub mod classifier;
pub mod error;
pub mod identifier;
pub mod operations;
pub mod storage;
pub mod timeline;

#[cfg(test)]
mod test_support;

pub use access::{Expiration, Exposure, Visibility};
pub use classifier::{DocumentKind, classify};
pub use error::{BlueprintError, Result};
pub use identifier::{DEFAULT_MAX_ATTEMPTS, IdentifierGenerator, KEY_ALPHABET, KEY_LENGTH};
pub use storage::{
    Database, Document, DocumentStore, RevisionLedger, RevisionRecord, ShardedBlobStore,
    compute_hash, verify_hash,
};
pub use timeline::{DiffLink, DiffPair, Timeline, TimelineDay, TimelineEntry, build_timeline};
