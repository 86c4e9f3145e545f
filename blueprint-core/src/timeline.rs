//! Day-grouped revision timelines for history and diff views.

use crate::storage::RevisionRecord;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// The two revisions being compared. `left` is conventionally the older one
/// but nothing here relies on that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffPair {
    pub left: i64,
    pub right: i64,
}

/// Target of a "Diff" action: compare `right` against the nearest earlier
/// revision `left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiffLink {
    pub left: i64,
    pub right: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub revision_number: i64,
    pub reason: String,
    pub published_at: DateTime<Utc>,
    pub is_current: bool,
    pub is_diff_left: bool,
    pub is_diff_right: bool,
    pub diff_link: Option<DiffLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineDay {
    pub date: NaiveDate,
    pub entries: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub document_id: i64,
    pub current_revision: i64,
    pub diff: Option<DiffPair>,
    pub days: Vec<TimelineDay>,
}

impl Timeline {
    pub fn entries(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.days.iter().flat_map(|day| day.entries.iter())
    }

    pub fn entry(&self, revision_number: i64) -> Option<&TimelineEntry> {
        self.entries()
            .find(|entry| entry.revision_number == revision_number)
    }
}

/// Build a timeline from a newest-first revision list, keeping that order.
///
/// Consecutive revisions published on the same UTC calendar day share one
/// group. Without a diff pair every revision that has an older neighbour gets
/// a diff link. With a diff pair only revisions sitting next to an endpoint
/// inside the same day group get one.
pub fn build_timeline(
    document_id: i64,
    current_revision: i64,
    revisions: &[RevisionRecord],
    diff: Option<DiffPair>,
) -> Timeline {
    let is_endpoint = |revision_number: i64| {
        diff.is_some_and(|pair| pair.left == revision_number || pair.right == revision_number)
    };

    let mut days: Vec<TimelineDay> = Vec::new();
    let mut day_of: Vec<usize> = Vec::with_capacity(revisions.len());

    for revision in revisions {
        let date = revision.published_at.date_naive();
        if days.last().map(|day| day.date) != Some(date) {
            days.push(TimelineDay {
                date,
                entries: Vec::new(),
            });
        }
        day_of.push(days.len() - 1);
    }

    for (index, revision) in revisions.iter().enumerate() {
        let day = day_of[index];
        let older = revisions.get(index + 1);

        let wants_link = match diff {
            None => true,
            Some(_) => {
                let prev_is_endpoint = index
                    .checked_sub(1)
                    .filter(|&prev| day_of[prev] == day)
                    .is_some_and(|prev| is_endpoint(revisions[prev].revision_number));
                let next_is_endpoint = older
                    .filter(|_| day_of[index + 1] == day)
                    .is_some_and(|next| is_endpoint(next.revision_number));
                prev_is_endpoint || next_is_endpoint
            }
        };

        let diff_link = older.filter(|_| wants_link).map(|older| DiffLink {
            left: older.revision_number,
            right: revision.revision_number,
        });

        days[day].entries.push(TimelineEntry {
            revision_number: revision.revision_number,
            reason: revision.reason.clone(),
            published_at: revision.published_at,
            is_current: revision.revision_number == current_revision,
            is_diff_left: diff.is_some_and(|pair| pair.left == revision.revision_number),
            is_diff_right: diff.is_some_and(|pair| pair.right == revision.revision_number),
            diff_link,
        });
    }

    Timeline {
        document_id,
        current_revision,
        diff,
        days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(revision_number: i64, published_at: &str) -> RevisionRecord {
        let published_at = DateTime::parse_from_rfc3339(published_at)
            .unwrap()
            .with_timezone(&Utc);
        RevisionRecord {
            id: revision_number,
            document_id: 1,
            revision_number,
            reason: format!("change {}", revision_number),
            content_sha256: String::new(),
            size_bytes: 0,
            created_at: published_at,
            published_at,
        }
    }

    fn history() -> Vec<RevisionRecord> {
        vec![
            record(5, "2024-03-02T18:00:00Z"),
            record(4, "2024-03-02T09:00:00Z"),
            record(3, "2024-03-01T22:00:00Z"),
            record(2, "2024-03-01T10:00:00Z"),
            record(1, "2024-03-01T08:00:00Z"),
        ]
    }

    #[test]
    fn test_groups_by_day_in_list_order() {
        let timeline = build_timeline(1, 5, &history(), None);

        assert_eq!(timeline.days.len(), 2);
        assert_eq!(
            timeline.days[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
        let first_day: Vec<i64> = timeline.days[0]
            .entries
            .iter()
            .map(|e| e.revision_number)
            .collect();
        let second_day: Vec<i64> = timeline.days[1]
            .entries
            .iter()
            .map(|e| e.revision_number)
            .collect();
        assert_eq!(first_day, vec![5, 4]);
        assert_eq!(second_day, vec![3, 2, 1]);
    }

    #[test]
    fn test_history_links_every_revision_to_its_predecessor() {
        let timeline = build_timeline(1, 5, &history(), None);

        assert!(timeline.entry(5).unwrap().is_current);
        assert!(!timeline.entry(4).unwrap().is_current);
        assert_eq!(
            timeline.entry(4).unwrap().diff_link,
            Some(DiffLink { left: 3, right: 4 })
        );
        // The oldest revision has nothing to compare against
        assert_eq!(timeline.entry(1).unwrap().diff_link, None);
    }

    #[test]
    fn test_diff_flags_and_adjacent_links() {
        let pair = DiffPair { left: 2, right: 4 };
        let timeline = build_timeline(1, 5, &history(), Some(pair));

        assert!(timeline.entry(2).unwrap().is_diff_left);
        assert!(timeline.entry(4).unwrap().is_diff_right);
        assert!(!timeline.entry(3).unwrap().is_diff_left);

        // 5 sits above endpoint 4 on the same day
        assert_eq!(
            timeline.entry(5).unwrap().diff_link,
            Some(DiffLink { left: 4, right: 5 })
        );
        // 4's neighbours on its day are 5 (not an endpoint) and nothing below
        assert_eq!(timeline.entry(4).unwrap().diff_link, None);
        // 3 and 1 surround endpoint 2 on the same day
        assert_eq!(
            timeline.entry(3).unwrap().diff_link,
            Some(DiffLink { left: 2, right: 3 })
        );
        assert_eq!(timeline.entry(1).unwrap().diff_link, None);
        assert_eq!(timeline.entry(2).unwrap().diff_link, None);
    }

    #[test]
    fn test_single_revision_diff_against_itself() {
        let revisions = vec![record(1, "2024-03-01T08:00:00Z")];
        let timeline = build_timeline(1, 1, &revisions, Some(DiffPair { left: 1, right: 1 }));

        assert_eq!(timeline.days.len(), 1);
        assert_eq!(timeline.days[0].entries.len(), 1);
        let entry = &timeline.days[0].entries[0];
        assert!(entry.is_diff_left && entry.is_diff_right && entry.is_current);
        assert_eq!(entry.diff_link, None);
    }
}
