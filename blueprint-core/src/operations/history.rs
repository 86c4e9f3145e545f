use crate::storage::{Database, DocumentStore, RevisionLedger};
use crate::timeline::{Timeline, build_timeline};
use crate::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct HistoryOperation {
    db: Arc<Database>,
}

#[derive(Debug, Clone)]
pub struct HistoryOperationRequest {
    pub document_id: i64,
}

#[derive(Debug, Clone)]
pub enum HistoryOperationOutcome {
    Found(Timeline),
    DocumentNotFound,
}

impl HistoryOperation {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn run(&self, request: HistoryOperationRequest) -> Result<HistoryOperationOutcome> {
        let conn = self.db.connection()?;
        let document = match DocumentStore::new(&conn).get(request.document_id)? {
            Some(document) if !document.is_deleted() => document,
            _ => return Ok(HistoryOperationOutcome::DocumentNotFound),
        };

        let revisions = RevisionLedger::new(&conn).list_revisions(document.id)?;
        Ok(HistoryOperationOutcome::Found(build_timeline(
            document.id,
            document.current_revision,
            &revisions,
            None,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::IdentifierGenerator;
    use crate::operations::{
        AddRevisionOperation, AddRevisionOperationRequest, CreateDocumentOperation,
    };
    use crate::test_support::TestEnv;
    use crate::timeline::DiffLink;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_history_of_backdated_import() {
        let env = TestEnv::new();
        let mut request = TestEnv::create_request("imported v1");
        request.published_at = Some(Utc.with_ymd_and_hms(2023, 5, 1, 9, 0, 0).unwrap());
        let created = CreateDocumentOperation::new(
            env.db.clone(),
            env.blob_store.clone(),
            IdentifierGenerator::new(env.blob_store.clone()),
        )
        .run(request)
        .unwrap();

        let add = AddRevisionOperation::new(env.db.clone(), env.blob_store.clone());
        add.run(AddRevisionOperationRequest {
            document_id: created.document_id,
            content: "imported v2".to_string(),
            reason: "import".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2023, 5, 1, 17, 30, 0).unwrap()),
        })
        .unwrap();
        add.run(AddRevisionOperationRequest {
            document_id: created.document_id,
            content: "imported v3".to_string(),
            reason: "import".to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2023, 5, 3, 12, 0, 0).unwrap()),
        })
        .unwrap();

        let outcome = HistoryOperation::new(env.db.clone())
            .run(HistoryOperationRequest {
                document_id: created.document_id,
            })
            .unwrap();
        let HistoryOperationOutcome::Found(timeline) = outcome else {
            panic!("expected history");
        };

        assert_eq!(timeline.diff, None);
        assert_eq!(timeline.days.len(), 2);
        assert_eq!(timeline.days[0].entries.len(), 1);
        assert_eq!(timeline.days[1].entries.len(), 2);
        assert!(timeline.entry(3).unwrap().is_current);
        assert_eq!(
            timeline.entry(3).unwrap().diff_link,
            Some(DiffLink { left: 2, right: 3 })
        );
        assert_eq!(
            timeline.entry(2).unwrap().diff_link,
            Some(DiffLink { left: 1, right: 2 })
        );
        assert_eq!(timeline.entry(1).unwrap().diff_link, None);
    }

    #[test]
    fn test_history_of_unknown_document() {
        let env = TestEnv::new();
        let outcome = HistoryOperation::new(env.db.clone())
            .run(HistoryOperationRequest { document_id: 7 })
            .unwrap();
        assert!(matches!(outcome, HistoryOperationOutcome::DocumentNotFound));
    }
}
