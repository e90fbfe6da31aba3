//! Keeps task rows in step with their task type.
//!
//! # Invariants
//! - After `propagate_task_type`, the type has exactly one task per date in
//!   its range and no task outside it.
//! - `num_people` and `score` are reset on every task of the type; per-task
//!   overrides of those two fields do not survive a type edit.
//! - Tags are not resynced: only the added/removed delta of the type edit is
//!   mirrored, so per-task tag overrides outside that delta survive.
//! - Must run inside the caller's transaction together with the type edit.

use crate::model::event::TagId;
use crate::model::task_type::{TaskType, TaskTypeId};
use crate::repo::task_type_repo::TaskTypeRepository;
use crate::repo::RepoResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Row counts touched by one propagation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationSummary {
    pub created: usize,
    pub deleted: usize,
    pub updated: usize,
    pub tags_added: usize,
    pub tags_removed: usize,
}

/// Propagates a created or edited task type onto its task rows.
///
/// `previous_tags` is the type's tag set before the edit; `None` for a new
/// type, in which case every current tag counts as added.
pub fn propagate_task_type<R: TaskTypeRepository + ?Sized>(
    repo: &R,
    task_type: &TaskType,
    previous_tags: Option<&BTreeSet<TagId>>,
) -> RepoResult<PropagationSummary> {
    let mut summary = sync_task_dates(repo, task_type)?;
    summary.updated = repo.reset_task_defaults(task_type.id, task_type.num_people, task_type.score)?;

    let empty = BTreeSet::new();
    let (added, removed) = mirror_tag_delta(
        repo,
        task_type.id,
        previous_tags.unwrap_or(&empty),
        &task_type.tags,
    )?;
    summary.tags_added = added;
    summary.tags_removed = removed;
    Ok(summary)
}

/// Deletes tasks outside the type's range and creates the missing ones.
///
/// Only `created` and `deleted` are filled in.
pub fn sync_task_dates<R: TaskTypeRepository + ?Sized>(
    repo: &R,
    task_type: &TaskType,
) -> RepoResult<PropagationSummary> {
    let existing = repo.list_task_dates(task_type.id)?;
    let required: BTreeSet<NaiveDate> = task_type.date_range.iter_dates().collect();

    let superfluous: BTreeSet<NaiveDate> = existing.difference(&required).copied().collect();
    let missing: BTreeSet<NaiveDate> = required.difference(&existing).copied().collect();

    let deleted = repo.delete_tasks_on_dates(task_type.id, &superfluous)?;
    let created = repo.insert_tasks(
        task_type.id,
        &missing,
        task_type.num_people,
        task_type.score,
        &task_type.tags,
    )?;

    Ok(PropagationSummary {
        created,
        deleted,
        ..PropagationSummary::default()
    })
}

/// Mirrors `current - previous` and `previous - current` onto every task row
/// of the type. Returns `(links added, links removed)`.
pub fn mirror_tag_delta<R: TaskTypeRepository + ?Sized>(
    repo: &R,
    task_type_id: TaskTypeId,
    previous: &BTreeSet<TagId>,
    current: &BTreeSet<TagId>,
) -> RepoResult<(usize, usize)> {
    let added: BTreeSet<TagId> = current.difference(previous).copied().collect();
    let removed: BTreeSet<TagId> = previous.difference(current).copied().collect();

    let added_links = if added.is_empty() {
        0
    } else {
        repo.add_tags_to_tasks(task_type_id, &added)?
    };
    let removed_links = if removed.is_empty() {
        0
    } else {
        repo.remove_tags_from_tasks(task_type_id, &removed)?
    };
    Ok((added_links, removed_links))
}

#[cfg(test)]
mod tests {
    use super::{mirror_tag_delta, propagate_task_type};
    use crate::model::date_range::DateRange;
    use crate::model::event::{EventId, TagId};
    use crate::model::task_type::{TaskType, TaskTypeId};
    use crate::repo::task_type_repo::TaskTypeRepository;
    use crate::repo::RepoResult;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    /// Task rows of one type keyed by date: (num_people, score, tags).
    #[derive(Default)]
    struct FakeRows {
        rows: RefCell<BTreeMap<NaiveDate, (u32, i64, BTreeSet<TagId>)>>,
    }

    impl TaskTypeRepository for FakeRows {
        fn insert_task_type(&self, task_type: &TaskType) -> RepoResult<TaskTypeId> {
            Ok(task_type.id)
        }
        fn update_task_type(&self, _task_type: &TaskType) -> RepoResult<()> {
            Ok(())
        }
        fn get_task_type(&self, _id: TaskTypeId) -> RepoResult<Option<TaskType>> {
            Ok(None)
        }
        fn list_task_types(&self, _event_id: EventId) -> RepoResult<Vec<TaskType>> {
            Ok(Vec::new())
        }
        fn set_task_type_tags(&self, _id: TaskTypeId, _tags: &BTreeSet<TagId>) -> RepoResult<()> {
            Ok(())
        }
        fn list_task_dates(&self, _id: TaskTypeId) -> RepoResult<BTreeSet<NaiveDate>> {
            Ok(self.rows.borrow().keys().copied().collect())
        }
        fn delete_tasks_on_dates(
            &self,
            _id: TaskTypeId,
            dates: &BTreeSet<NaiveDate>,
        ) -> RepoResult<usize> {
            let mut rows = self.rows.borrow_mut();
            Ok(dates.iter().filter(|d| rows.remove(d).is_some()).count())
        }
        fn insert_tasks(
            &self,
            _id: TaskTypeId,
            dates: &BTreeSet<NaiveDate>,
            num_people: u32,
            score: i64,
            tags: &BTreeSet<TagId>,
        ) -> RepoResult<usize> {
            let mut rows = self.rows.borrow_mut();
            for date in dates {
                rows.insert(*date, (num_people, score, tags.clone()));
            }
            Ok(dates.len())
        }
        fn reset_task_defaults(
            &self,
            _id: TaskTypeId,
            num_people: u32,
            score: i64,
        ) -> RepoResult<usize> {
            let mut rows = self.rows.borrow_mut();
            for row in rows.values_mut() {
                row.0 = num_people;
                row.1 = score;
            }
            Ok(rows.len())
        }
        fn add_tags_to_tasks(&self, _id: TaskTypeId, tags: &BTreeSet<TagId>) -> RepoResult<usize> {
            let mut added = 0;
            for row in self.rows.borrow_mut().values_mut() {
                for tag in tags {
                    if row.2.insert(*tag) {
                        added += 1;
                    }
                }
            }
            Ok(added)
        }
        fn remove_tags_from_tasks(
            &self,
            _id: TaskTypeId,
            tags: &BTreeSet<TagId>,
        ) -> RepoResult<usize> {
            let mut removed = 0;
            for row in self.rows.borrow_mut().values_mut() {
                for tag in tags {
                    if row.2.remove(tag) {
                        removed += 1;
                    }
                }
            }
            Ok(removed)
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 8, d).unwrap()
    }

    fn cook(start: u32, end: u32) -> TaskType {
        TaskType::new(
            Uuid::new_v4(),
            "Dinner Cook",
            DateRange::new(day(start), day(end)).unwrap(),
            2,
            3,
        )
    }

    #[test]
    fn new_type_gets_one_row_per_date() {
        let repo = FakeRows::default();
        let summary = propagate_task_type(&repo, &cook(1, 5), None).unwrap();
        assert_eq!(summary.created, 5);
        assert_eq!(summary.deleted, 0);
        assert_eq!(repo.rows.borrow().len(), 5);
    }

    #[test]
    fn moving_the_range_deletes_and_creates_only_the_difference() {
        let repo = FakeRows::default();
        let mut task_type = cook(1, 5);
        propagate_task_type(&repo, &task_type, None).unwrap();

        task_type.date_range = DateRange::new(day(3), day(7)).unwrap();
        let summary = propagate_task_type(&repo, &task_type, Some(&BTreeSet::new())).unwrap();
        assert_eq!(summary.deleted, 2);
        assert_eq!(summary.created, 2);
        let dates: Vec<_> = repo.rows.borrow().keys().copied().collect();
        assert_eq!(dates, (3..=7).map(day).collect::<Vec<_>>());
    }

    #[test]
    fn defaults_overwrite_per_task_overrides() {
        let repo = FakeRows::default();
        let mut task_type = cook(1, 2);
        propagate_task_type(&repo, &task_type, None).unwrap();
        repo.rows.borrow_mut().get_mut(&day(1)).unwrap().0 = 9;

        task_type.score = 4;
        propagate_task_type(&repo, &task_type, Some(&BTreeSet::new())).unwrap();
        for (num_people, score, _) in repo.rows.borrow().values() {
            assert_eq!((*num_people, *score), (2, 4));
        }
    }

    #[test]
    fn only_the_tag_delta_is_mirrored() {
        let repo = FakeRows::default();
        let task_type = cook(1, 2);
        propagate_task_type(&repo, &task_type, None).unwrap();

        let local = Uuid::new_v4();
        repo.rows.borrow_mut().get_mut(&day(1)).unwrap().2.insert(local);

        let chef = Uuid::new_v4();
        let (added, removed) =
            mirror_tag_delta(&repo, task_type.id, &BTreeSet::new(), &BTreeSet::from([chef]))
                .unwrap();
        assert_eq!((added, removed), (2, 0));
        assert!(repo.rows.borrow()[&day(1)].2.contains(&local));

        let (added, removed) =
            mirror_tag_delta(&repo, task_type.id, &BTreeSet::from([chef]), &BTreeSet::new())
                .unwrap();
        assert_eq!((added, removed), (0, 2));
        assert_eq!(repo.rows.borrow()[&day(1)].2, BTreeSet::from([local]));
    }
}
