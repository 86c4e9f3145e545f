use crate::error::{BlueprintError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the SQLite database holding documents and the revision ledger.
///
/// Connections are opened per operation; SQLite serializes writers, and every
/// mutating operation takes an immediate transaction so read-then-insert
/// sequences (next revision number, key pre-checks) cannot interleave.
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                storage_key TEXT NOT NULL UNIQUE,
                slug TEXT NOT NULL,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                engine_version TEXT,
                exposure TEXT NOT NULL,
                owner_id INTEGER,
                current_revision INTEGER NOT NULL,
                last_revision INTEGER NOT NULL DEFAULT 1,
                expires_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                published_at TEXT NOT NULL,
                deleted_at TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_owner ON documents(owner_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_listing
             ON documents(exposure, deleted_at, published_at)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS revisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL,
                revision_number INTEGER NOT NULL CHECK (revision_number > 0),
                reason TEXT NOT NULL,
                content_sha256 TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                published_at TEXT NOT NULL,
                UNIQUE (document_id, revision_number),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_revisions_timeline
             ON revisions(document_id, created_at DESC, id DESC)",
            [],
        )?;

        Ok(())
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that
/// lexicographic order equals chronological order.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(index: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

pub(crate) fn parse_optional_timestamp(
    index: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value
        .as_deref()
        .map(|v| parse_timestamp(index, v))
        .transpose()
}

/// Parse a TEXT column holding one of the crate's enums.
pub(crate) fn parse_column<T>(index: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = BlueprintError>,
{
    value.parse().map_err(|e: BlueprintError| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}
