use crate::error::{BlueprintError, Result};
use crate::storage::database::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ledger entry for one historical revision of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub id: i64,
    pub document_id: i64,
    pub revision_number: i64,
    pub reason: String,
    pub content_sha256: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRevision {
    pub revision_number: i64,
    pub reason: String,
    pub content_sha256: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

const REVISION_COLUMNS: &str =
    "id, document_id, revision_number, reason, content_sha256, size_bytes, created_at, published_at";

pub struct RevisionLedger<'a> {
    conn: &'a Connection,
}

impl<'a> RevisionLedger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// `max(revision_number) + 1` over the surviving rows. Callers that
    /// append must also stay above the document's `last_revision`, since the
    /// maximum itself may have been deleted.
    pub fn next_revision_number(&self, document_id: i64) -> Result<i64> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(revision_number) FROM revisions WHERE document_id = ?1",
            [document_id],
            |row| row.get(0),
        )?;

        max.map(|max| max + 1)
            .ok_or(BlueprintError::NoRevisions(document_id))
    }

    /// All revisions of a document, newest first. Ties on `created_at` fall
    /// back to insertion order.
    pub fn list_revisions(&self, document_id: i64) -> Result<Vec<RevisionRecord>> {
        let sql = format!(
            "SELECT {} FROM revisions WHERE document_id = ?1
             ORDER BY created_at DESC, id DESC",
            REVISION_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([document_id], revision_from_row)?;

        let mut revisions = Vec::new();
        for row in rows {
            revisions.push(row?);
        }
        Ok(revisions)
    }

    pub fn get(&self, document_id: i64, revision_number: i64) -> Result<Option<RevisionRecord>> {
        let sql = format!(
            "SELECT {} FROM revisions WHERE document_id = ?1 AND revision_number = ?2",
            REVISION_COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![document_id, revision_number], revision_from_row)
            .optional()?;
        Ok(record)
    }

    pub fn insert(&self, document_id: i64, revision: &NewRevision) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO revisions (
                document_id, revision_number, reason, content_sha256, size_bytes,
                created_at, published_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                document_id,
                revision.revision_number,
                revision.reason,
                revision.content_sha256,
                revision.size_bytes as i64,
                format_timestamp(&revision.created_at),
                format_timestamp(&revision.published_at),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete(&self, document_id: i64, revision_number: i64) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM revisions WHERE document_id = ?1 AND revision_number = ?2",
            params![document_id, revision_number],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_all(&self, document_id: i64) -> Result<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM revisions WHERE document_id = ?1", [document_id])?;
        Ok(affected)
    }

    /// Every (storage key, revision) pair the ledger vouches for.
    pub fn blob_references(&self) -> Result<HashSet<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.storage_key, r.revision_number
             FROM revisions r JOIN documents d ON d.id = r.document_id",
        )?;

        let rows = stmt.query_map([], |row| {
            let storage_key: String = row.get(0)?;
            let revision: i64 = row.get(1)?;
            Ok((storage_key, revision))
        })?;

        let mut refs = HashSet::new();
        for row in rows {
            refs.insert(row?);
        }
        Ok(refs)
    }
}

fn revision_from_row(row: &Row<'_>) -> rusqlite::Result<RevisionRecord> {
    let size_bytes: i64 = row.get(5)?;
    let created_at: String = row.get(6)?;
    let published_at: String = row.get(7)?;

    Ok(RevisionRecord {
        id: row.get(0)?,
        document_id: row.get(1)?,
        revision_number: row.get(2)?,
        reason: row.get(3)?,
        content_sha256: row.get(4)?,
        size_bytes: size_bytes as u64,
        created_at: parse_timestamp(6, &created_at)?,
        published_at: parse_timestamp(7, &published_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Exposure;
    use crate::classifier::DocumentKind;
    use crate::storage::{Database, DocumentStore, NewDocument};
    use chrono::Duration;

    fn setup() -> (tempfile::TempDir, Database, i64) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Database::open(temp_dir.path().join("blueprint.db")).unwrap();
        let conn = db.connection().unwrap();
        let now = Utc::now();
        let id = DocumentStore::new(&conn)
            .insert(&NewDocument {
                storage_key: "ledger01".to_string(),
                slug: "ledger".to_string(),
                title: "Ledger".to_string(),
                kind: DocumentKind::Blueprint,
                engine_version: None,
                exposure: Exposure::Public,
                owner_id: None,
                expires_at: None,
                created_at: now,
                published_at: now,
            })
            .unwrap();
        (temp_dir, db, id)
    }

    fn revision(number: i64, created_at: DateTime<Utc>) -> NewRevision {
        NewRevision {
            revision_number: number,
            reason: format!("rev {}", number),
            content_sha256: "00".repeat(32),
            size_bytes: 10,
            created_at,
            published_at: created_at,
        }
    }

    #[test]
    fn test_next_revision_number() {
        let (_temp_dir, db, id) = setup();
        let conn = db.connection().unwrap();
        let ledger = RevisionLedger::new(&conn);

        assert!(matches!(
            ledger.next_revision_number(id),
            Err(BlueprintError::NoRevisions(_))
        ));

        let now = Utc::now();
        ledger.insert(id, &revision(1, now)).unwrap();
        ledger.insert(id, &revision(2, now)).unwrap();
        ledger.insert(id, &revision(3, now)).unwrap();
        assert_eq!(ledger.next_revision_number(id).unwrap(), 4);

        // Deleting a middle revision does not free its number
        ledger.delete(id, 2).unwrap();
        assert_eq!(ledger.next_revision_number(id).unwrap(), 4);
    }

    #[test]
    fn test_list_revisions_newest_first_with_id_tiebreak() {
        let (_temp_dir, db, id) = setup();
        let conn = db.connection().unwrap();
        let ledger = RevisionLedger::new(&conn);

        let base = Utc::now();
        ledger.insert(id, &revision(1, base)).unwrap();
        ledger
            .insert(id, &revision(2, base + Duration::seconds(5)))
            .unwrap();
        // Same instant as revision 2, inserted later
        ledger
            .insert(id, &revision(3, base + Duration::seconds(5)))
            .unwrap();

        let numbers: Vec<i64> = ledger
            .list_revisions(id)
            .unwrap()
            .iter()
            .map(|r| r.revision_number)
            .collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }

    #[test]
    fn test_duplicate_revision_number_rejected() {
        let (_temp_dir, db, id) = setup();
        let conn = db.connection().unwrap();
        let ledger = RevisionLedger::new(&conn);

        ledger.insert(id, &revision(1, Utc::now())).unwrap();
        let err = ledger.insert(id, &revision(1, Utc::now())).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_delete_and_references() {
        let (_temp_dir, db, id) = setup();
        let conn = db.connection().unwrap();
        let ledger = RevisionLedger::new(&conn);

        ledger.insert(id, &revision(1, Utc::now())).unwrap();
        ledger.insert(id, &revision(2, Utc::now())).unwrap();

        let refs = ledger.blob_references().unwrap();
        assert!(refs.contains(&("ledger01".to_string(), 1)));
        assert!(refs.contains(&("ledger01".to_string(), 2)));

        assert!(ledger.get(id, 2).unwrap().is_some());
        assert!(ledger.delete(id, 2).unwrap());
        assert!(!ledger.delete(id, 2).unwrap());
        assert!(ledger.get(id, 2).unwrap().is_none());

        assert_eq!(ledger.delete_all(id).unwrap(), 1);
        assert!(ledger.list_revisions(id).unwrap().is_empty());
    }
}
