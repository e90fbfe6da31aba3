//! Data access contract consumed by the assignment engine.
//!
//! # Responsibility
//! - Load the per-run snapshot: open tasks, candidate profiles, per-type
//!   assignment counts.
//! - Persist the engine's plan and clear earlier assignments.
//! - Answer the scope checks that keep a selector inside one event.
//!
//! # Invariants
//! - Callers hold one transaction around snapshot load and plan insert;
//!   this repository does not open transactions of its own.
//! - Open tasks are exactly those with `assignee_count < num_people`.

use super::event_repo::{load_id_set, stored_range};
use super::{bool_to_int, count_column, ensure_tables, push_uuid_in_list, uuid_column, RepoResult};
use crate::assign::engine::PlannedAssignment;
use crate::assign::snapshot::{CandidateProfile, OpenTask, TaskTypeCount};
use crate::model::event::EventId;
use crate::model::task::TaskId;
use crate::model::task_type::TaskTypeId;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Which tasks of an event a run or a clear applies to.
///
/// Every populated field narrows the selection; an empty selector means all
/// tasks of the event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSelector {
    pub task_ids: Option<Vec<TaskId>>,
    pub task_type_id: Option<TaskTypeId>,
    pub date: Option<NaiveDate>,
}

impl TaskSelector {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_task_ids(ids: impl IntoIterator<Item = TaskId>) -> Self {
        Self {
            task_ids: Some(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn by_task_type(task_type_id: TaskTypeId) -> Self {
        Self {
            task_type_id: Some(task_type_id),
            ..Self::default()
        }
    }

    pub fn by_date(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    pub fn with_task_type(mut self, task_type_id: TaskTypeId) -> Self {
        self.task_type_id = Some(task_type_id);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Repository interface backing one assignment run.
pub trait ScheduleRepository {
    fn event_exists(&self, event_id: EventId) -> RepoResult<bool>;
    /// Owning event of a task type, or `None` if the type does not exist.
    fn task_type_event(&self, task_type_id: TaskTypeId) -> RepoResult<Option<EventId>>;
    /// Ids from `task_ids` that are not tasks of `event_id`.
    fn foreign_task_ids(&self, event_id: EventId, task_ids: &[TaskId]) -> RepoResult<Vec<TaskId>>;
    /// Selected tasks with at least one open slot.
    fn list_open_tasks(&self, event_id: EventId, selector: &TaskSelector)
        -> RepoResult<Vec<OpenTask>>;
    /// Every participant of the event with busy dates and assigned score.
    fn list_candidate_profiles(&self, event_id: EventId) -> RepoResult<Vec<CandidateProfile>>;
    /// Assignment counts per participant and task type, manual and automatic.
    fn task_type_counts(&self, event_id: EventId) -> RepoResult<Vec<TaskTypeCount>>;
    /// Inserts the plan as `automatic = 1` rows.
    fn insert_automatic_assignments(&self, assignments: &[PlannedAssignment])
        -> RepoResult<usize>;
    /// Deletes assignments on the given tasks; automatic rows only unless
    /// `include_manual`.
    fn delete_assignments(&self, task_ids: &[TaskId], include_manual: bool) -> RepoResult<usize>;
}

/// SQLite-backed schedule repository.
pub struct SqliteScheduleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteScheduleRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(
            conn,
            &[
                "participants",
                "participant_tags",
                "participant_conflicts",
                "task_types",
                "tasks",
                "task_tags",
                "task_exclusions",
                "assignments",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl ScheduleRepository for SqliteScheduleRepository<'_> {
    fn event_exists(&self, event_id: EventId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM events WHERE uuid = ?1);",
            [event_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn task_type_event(&self, task_type_id: TaskTypeId) -> RepoResult<Option<EventId>> {
        let event: Option<String> = self
            .conn
            .query_row(
                "SELECT event_uuid FROM task_types WHERE uuid = ?1;",
                [task_type_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        event
            .map(|value| super::parse_uuid(&value, "task_types.event_uuid"))
            .transpose()
    }

    fn foreign_task_ids(&self, event_id: EventId, task_ids: &[TaskId]) -> RepoResult<Vec<TaskId>> {
        let mut sql = String::from(
            "SELECT t.uuid
             FROM tasks t
             INNER JOIN task_types tt ON tt.uuid = t.task_type_uuid
             WHERE tt.event_uuid = ? AND t.uuid",
        );
        let mut binds = vec![Value::Text(event_id.to_string())];
        push_uuid_in_list(&mut sql, &mut binds, task_ids);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut owned = HashSet::new();
        while let Some(row) = rows.next()? {
            owned.insert(uuid_column(row, "uuid")?);
        }

        Ok(task_ids
            .iter()
            .copied()
            .filter(|id| !owned.contains(id))
            .collect())
    }

    fn list_open_tasks(
        &self,
        event_id: EventId,
        selector: &TaskSelector,
    ) -> RepoResult<Vec<OpenTask>> {
        let (filter, binds) = task_filter_sql(event_id, selector);
        let sql = format!(
            "SELECT
                t.uuid,
                t.task_type_uuid,
                tt.name AS task_type_name,
                t.date,
                t.num_people,
                t.score
             FROM tasks t
             INNER JOIN task_types tt ON tt.uuid = t.task_type_uuid
             WHERE {filter}
               AND (SELECT COUNT(*) FROM assignments a WHERE a.task_uuid = t.uuid) < t.num_people
             ORDER BY tt.name ASC, t.date ASC, t.uuid ASC;"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            let id = uuid_column(row, "uuid")?;
            let key = id.to_string();
            tasks.push(OpenTask {
                id,
                task_type_id: uuid_column(row, "task_type_uuid")?,
                task_type_name: row.get("task_type_name")?,
                date: row.get("date")?,
                num_people: count_column(row, "num_people")?,
                score: row.get("score")?,
                tags: load_id_set(
                    self.conn,
                    "SELECT tag_uuid FROM task_tags WHERE task_uuid = ?1;",
                    &key,
                    "task_tags.tag_uuid",
                )?,
                do_not_assign_to: load_id_set(
                    self.conn,
                    "SELECT participant_uuid FROM task_exclusions WHERE task_uuid = ?1;",
                    &key,
                    "task_exclusions.participant_uuid",
                )?,
                assignees: load_id_set(
                    self.conn,
                    "SELECT participant_uuid FROM assignments WHERE task_uuid = ?1;",
                    &key,
                    "assignments.participant_uuid",
                )?
                .into_iter()
                .collect(),
            });
        }
        Ok(tasks)
    }

    fn list_candidate_profiles(&self, event_id: EventId) -> RepoResult<Vec<CandidateProfile>> {
        let event_key = event_id.to_string();
        let mut busy_dates = self.busy_dates_by_participant(&event_key)?;

        let mut stmt = self.conn.prepare(
            "SELECT
                p.uuid,
                p.start_date,
                p.end_date,
                p.initial_score + COALESCE((
                    SELECT SUM(t.score)
                    FROM assignments a
                    INNER JOIN tasks t ON t.uuid = a.task_uuid
                    WHERE a.participant_uuid = p.uuid
                ), 0) AS assigned_score
             FROM participants p
             WHERE p.event_uuid = ?1
             ORDER BY p.uuid ASC;",
        )?;
        let mut rows = stmt.query([event_key.as_str()])?;
        let mut profiles = Vec::new();
        while let Some(row) = rows.next()? {
            let id = uuid_column(row, "uuid")?;
            let key = id.to_string();
            profiles.push(CandidateProfile {
                id,
                date_range: stored_range(
                    row.get("start_date")?,
                    row.get("end_date")?,
                    "participants",
                )?,
                tags: load_id_set(
                    self.conn,
                    "SELECT tag_uuid FROM participant_tags WHERE participant_uuid = ?1;",
                    &key,
                    "participant_tags.tag_uuid",
                )?,
                do_not_assign_with: load_id_set(
                    self.conn,
                    "SELECT other_uuid FROM participant_conflicts WHERE participant_uuid = ?1;",
                    &key,
                    "participant_conflicts.other_uuid",
                )?,
                busy_dates: busy_dates.remove(&id).unwrap_or_default(),
                assigned_score: row.get("assigned_score")?,
            });
        }
        Ok(profiles)
    }

    fn task_type_counts(&self, event_id: EventId) -> RepoResult<Vec<TaskTypeCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                a.participant_uuid,
                t.task_type_uuid,
                COUNT(*) AS assigned
             FROM assignments a
             INNER JOIN tasks t ON t.uuid = a.task_uuid
             INNER JOIN task_types tt ON tt.uuid = t.task_type_uuid
             WHERE tt.event_uuid = ?1
             GROUP BY a.participant_uuid, t.task_type_uuid;",
        )?;
        let mut rows = stmt.query([event_id.to_string()])?;
        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            counts.push(TaskTypeCount {
                participant_id: uuid_column(row, "participant_uuid")?,
                task_type_id: uuid_column(row, "task_type_uuid")?,
                count: count_column(row, "assigned")?,
            });
        }
        Ok(counts)
    }

    fn insert_automatic_assignments(
        &self,
        assignments: &[PlannedAssignment],
    ) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO assignments (participant_uuid, task_uuid, automatic)
             VALUES (?1, ?2, ?3);",
        )?;
        for assignment in assignments {
            stmt.execute(params![
                assignment.participant_id.to_string(),
                assignment.task_id.to_string(),
                bool_to_int(true),
            ])?;
        }
        Ok(assignments.len())
    }

    fn delete_assignments(&self, task_ids: &[TaskId], include_manual: bool) -> RepoResult<usize> {
        let mut sql = String::from("DELETE FROM assignments WHERE task_uuid");
        let mut binds = Vec::new();
        push_uuid_in_list(&mut sql, &mut binds, task_ids);
        if !include_manual {
            sql.push_str(" AND automatic = 1");
        }
        let deleted = self.conn.execute(&sql, params_from_iter(binds))?;
        Ok(deleted)
    }
}

impl SqliteScheduleRepository<'_> {
    fn busy_dates_by_participant(
        &self,
        event_key: &str,
    ) -> RepoResult<HashMap<uuid::Uuid, HashSet<NaiveDate>>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.participant_uuid, t.date
             FROM assignments a
             INNER JOIN tasks t ON t.uuid = a.task_uuid
             INNER JOIN participants p ON p.uuid = a.participant_uuid
             WHERE p.event_uuid = ?1;",
        )?;
        let mut rows = stmt.query([event_key])?;
        let mut busy: HashMap<_, HashSet<NaiveDate>> = HashMap::new();
        while let Some(row) = rows.next()? {
            let participant_id = uuid_column(row, "participant_uuid")?;
            busy.entry(participant_id)
                .or_default()
                .insert(row.get("date")?);
        }
        Ok(busy)
    }
}

/// Renders the `WHERE` body selecting tasks of one event.
///
/// Expects the query to alias `tasks` as `t` and `task_types` as `tt`.
pub(crate) fn task_filter_sql(event_id: EventId, selector: &TaskSelector) -> (String, Vec<Value>) {
    let mut sql = String::from("tt.event_uuid = ?");
    let mut binds = vec![Value::Text(event_id.to_string())];

    if let Some(task_type_id) = selector.task_type_id {
        sql.push_str(" AND t.task_type_uuid = ?");
        binds.push(Value::Text(task_type_id.to_string()));
    }
    if let Some(date) = selector.date {
        sql.push_str(" AND t.date = ?");
        binds.push(Value::Text(date.to_string()));
    }
    if let Some(task_ids) = selector.task_ids.as_ref() {
        let unique: BTreeSet<TaskId> = task_ids.iter().copied().collect();
        let unique: Vec<TaskId> = unique.into_iter().collect();
        sql.push_str(" AND t.uuid");
        push_uuid_in_list(&mut sql, &mut binds, &unique);
    }

    (sql, binds)
}
