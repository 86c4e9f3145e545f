use crate::access::{self, Exposure, Visibility};
use crate::classifier::DocumentKind;
use crate::error::Result;
use crate::storage::database::{
    format_timestamp, parse_column, parse_optional_timestamp, parse_timestamp,
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

/// A versioned blueprint as stored in the `documents` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub storage_key: String,
    pub slug: String,
    pub title: String,
    pub kind: DocumentKind,
    pub engine_version: Option<String>,
    pub exposure: Exposure,
    pub owner_id: Option<i64>,
    pub current_revision: i64,
    /// Highest revision number ever assigned, including deleted ones.
    pub last_revision: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn visibility(&self, viewer: Option<i64>, now: DateTime<Utc>) -> Visibility {
        access::visibility(
            self.exposure,
            self.owner_id,
            self.expires_at,
            self.deleted_at,
            viewer,
            now,
        )
    }
}

/// Column values for a document row that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub storage_key: String,
    pub slug: String,
    pub title: String,
    pub kind: DocumentKind,
    pub engine_version: Option<String>,
    pub exposure: Exposure,
    pub owner_id: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

const DOCUMENT_COLUMNS: &str = "id, storage_key, slug, title, kind, engine_version, exposure,
     owner_id, current_revision, last_revision, expires_at, created_at, updated_at, published_at,
     deleted_at";

/// Queries against the `documents` table. Borrows a connection so the same
/// calls work inside or outside a transaction.
pub struct DocumentStore<'a> {
    conn: &'a Connection,
}

impl<'a> DocumentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a document pointing at revision 1. Returns the new row id.
    pub fn insert(&self, doc: &NewDocument) -> Result<i64> {
        let created_at = format_timestamp(&doc.created_at);

        self.conn.execute(
            "INSERT INTO documents (
                storage_key, slug, title, kind, engine_version, exposure, owner_id,
                current_revision, expires_at, created_at, updated_at, published_at, deleted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?9, ?10, NULL)",
            params![
                doc.storage_key,
                doc.slug,
                doc.title,
                doc.kind.as_str(),
                doc.engine_version,
                doc.exposure.as_str(),
                doc.owner_id,
                doc.expires_at.as_ref().map(format_timestamp),
                created_at,
                format_timestamp(&doc.published_at),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn get(&self, id: i64) -> Result<Option<Document>> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        let doc = self
            .conn
            .query_row(&sql, [id], document_from_row)
            .optional()?;
        Ok(doc)
    }

    pub fn get_by_storage_key(&self, storage_key: &str) -> Result<Option<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE storage_key = ?1",
            DOCUMENT_COLUMNS
        );
        let doc = self
            .conn
            .query_row(&sql, [storage_key.to_ascii_lowercase()], document_from_row)
            .optional()?;
        Ok(doc)
    }

    pub fn storage_key_exists(&self, storage_key: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM documents WHERE storage_key = ?1",
                [storage_key.to_ascii_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Point a document at another revision. `last_revision` only ever
    /// grows, so repointing backwards leaves it alone.
    pub fn set_current_revision(
        &self,
        id: i64,
        revision: i64,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE documents
             SET current_revision = ?1, last_revision = MAX(last_revision, ?1), updated_at = ?2
             WHERE id = ?3",
            params![revision, format_timestamp(&updated_at), id],
        )?;
        Ok(affected > 0)
    }

    /// Soft delete - set the deletion timestamp once
    pub fn soft_delete(&self, id: i64, deleted_at: DateTime<Utc>) -> Result<bool> {
        let deleted_at = format_timestamp(&deleted_at);
        let affected = self.conn.execute(
            "UPDATE documents SET deleted_at = ?1, updated_at = ?1
             WHERE id = ?2 AND deleted_at IS NULL",
            params![deleted_at, id],
        )?;
        Ok(affected > 0)
    }

    /// Hard delete. Ledger rows go with it through the foreign key cascade.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Detach every document from a removed owner.
    pub fn anonymize_owner(&self, owner_id: i64) -> Result<usize> {
        let affected = self.conn.execute(
            "UPDATE documents SET owner_id = NULL WHERE owner_id = ?1",
            [owner_id],
        )?;
        Ok(affected)
    }

    /// Public, live, unexpired documents, most recently published first.
    pub fn list_public(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<Document>> {
        let sql = format!(
            "SELECT {} FROM documents
             WHERE exposure = 'public' AND deleted_at IS NULL
               AND (expires_at IS NULL OR expires_at > ?1)
             ORDER BY published_at DESC, id DESC
             LIMIT ?2",
            DOCUMENT_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![format_timestamp(&now), limit as i64],
            document_from_row,
        )?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let kind: String = row.get(4)?;
    let exposure: String = row.get(6)?;
    let expires_at: Option<String> = row.get(10)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;
    let published_at: String = row.get(13)?;
    let deleted_at: Option<String> = row.get(14)?;

    Ok(Document {
        id: row.get(0)?,
        storage_key: row.get(1)?,
        slug: row.get(2)?,
        title: row.get(3)?,
        kind: parse_column(4, &kind)?,
        engine_version: row.get(5)?,
        exposure: parse_column(6, &exposure)?,
        owner_id: row.get(7)?,
        current_revision: row.get(8)?,
        last_revision: row.get(9)?,
        expires_at: parse_optional_timestamp(10, expires_at)?,
        created_at: parse_timestamp(11, &created_at)?,
        updated_at: parse_timestamp(12, &updated_at)?,
        published_at: parse_timestamp(13, &published_at)?,
        deleted_at: parse_optional_timestamp(14, deleted_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use chrono::Duration;

    fn new_document(storage_key: &str, exposure: Exposure) -> NewDocument {
        let now = Utc::now();
        NewDocument {
            storage_key: storage_key.to_string(),
            slug: "my-blueprint".to_string(),
            title: "My Blueprint".to_string(),
            kind: DocumentKind::Material,
            engine_version: Some("5.3".to_string()),
            exposure,
            owner_id: Some(7),
            expires_at: None,
            created_at: now,
            published_at: now,
        }
    }

    #[test]
    fn test_document_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Database::open(temp_dir.path().join("blueprint.db")).unwrap();
        let conn = db.connection().unwrap();
        let store = DocumentStore::new(&conn);

        let id = store
            .insert(&new_document("abcdefgh", Exposure::Public))
            .unwrap();
        let doc = store.get(id).unwrap().unwrap();
        assert_eq!(doc.storage_key, "abcdefgh");
        assert_eq!(doc.current_revision, 1);
        assert_eq!(doc.kind, DocumentKind::Material);
        assert_eq!(doc.engine_version.as_deref(), Some("5.3"));
        assert!(!doc.is_deleted());

        assert!(store.storage_key_exists("abcdefgh").unwrap());
        assert!(store.storage_key_exists("ABCDEFGH").unwrap());
        assert!(!store.storage_key_exists("zzzzzzzz").unwrap());
        assert_eq!(store.get_by_storage_key("abcdefgh").unwrap().unwrap().id, id);

        assert!(store.set_current_revision(id, 4, Utc::now()).unwrap());
        assert_eq!(store.get(id).unwrap().unwrap().current_revision, 4);
        assert!(store.set_current_revision(id, 2, Utc::now()).unwrap());
        let doc = store.get(id).unwrap().unwrap();
        assert_eq!(doc.current_revision, 2);
        assert_eq!(doc.last_revision, 4);

        assert!(store.soft_delete(id, Utc::now()).unwrap());
        assert!(!store.soft_delete(id, Utc::now()).unwrap());
        assert!(store.get(id).unwrap().unwrap().is_deleted());

        assert!(store.delete(id).unwrap());
        assert!(store.get(id).unwrap().is_none());
        assert!(!store.delete(id).unwrap());
    }

    #[test]
    fn test_duplicate_storage_key_is_unique_violation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Database::open(temp_dir.path().join("blueprint.db")).unwrap();
        let conn = db.connection().unwrap();
        let store = DocumentStore::new(&conn);

        store
            .insert(&new_document("dupdupdu", Exposure::Public))
            .unwrap();
        let err = store
            .insert(&new_document("dupdupdu", Exposure::Public))
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_anonymize_owner_and_listing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Database::open(temp_dir.path().join("blueprint.db")).unwrap();
        let conn = db.connection().unwrap();
        let store = DocumentStore::new(&conn);

        let public = store
            .insert(&new_document("public01", Exposure::Public))
            .unwrap();
        store
            .insert(&new_document("unlist01", Exposure::Unlisted))
            .unwrap();
        let mut expired = new_document("expire01", Exposure::Public);
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        store.insert(&expired).unwrap();

        let listed = store.list_public(10, Utc::now()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, public);

        assert_eq!(store.anonymize_owner(7).unwrap(), 3);
        assert_eq!(store.get(public).unwrap().unwrap().owner_id, None);
        assert_eq!(store.anonymize_owner(7).unwrap(), 0);
    }
}
