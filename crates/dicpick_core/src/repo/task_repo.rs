//! Per-task reads and manual edits.
//!
//! Covers the edits a coordinator makes by hand: overriding one day's
//! people count, score, tags or exclusions, and assigning someone manually.

use super::event_repo::load_id_set;
use super::schedule_repo::{task_filter_sql, TaskSelector};
use super::{
    bool_to_int, count_column, ensure_same_event, ensure_tables, owning_event, uuid_column,
    EventScoped, RepoError, RepoResult,
};
use crate::model::event::{EventId, TagId};
use crate::model::participant::ParticipantId;
use crate::model::task::{Assignment, Task, TaskId};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeSet;

const TASK_SELECT_SQL: &str = "SELECT
    t.uuid,
    t.task_type_uuid,
    t.date,
    t.num_people,
    t.score
FROM tasks t
INNER JOIN task_types tt ON tt.uuid = t.task_type_uuid";

/// Repository interface for task-level reads and manual edits.
pub trait TaskRepository {
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Selected tasks of one event, sorted by task type name then date.
    fn list_tasks(&self, event_id: EventId, selector: &TaskSelector) -> RepoResult<Vec<Task>>;
    /// Overrides this task's people count and score.
    ///
    /// Fails with `Conflict` if `num_people` is below the current assignee count.
    fn update_task_overrides(&self, id: TaskId, num_people: u32, score: i64) -> RepoResult<()>;
    /// Replaces the task's tags. Every tag must belong to the task's event.
    fn set_task_tags(&self, id: TaskId, tags: &BTreeSet<TagId>) -> RepoResult<()>;
    /// Replaces the task's exclusions. Every participant must belong to the
    /// task's event.
    fn set_task_exclusions(&self, id: TaskId, participants: &BTreeSet<ParticipantId>)
        -> RepoResult<()>;
    /// Adds a manual (`automatic = 0`) assignment.
    ///
    /// Fails with `Conflict` when the task is full or the pair already exists.
    fn add_manual_assignment(&self, id: TaskId, participant_id: ParticipantId) -> RepoResult<()>;
    fn remove_assignment(&self, id: TaskId, participant_id: ParticipantId) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["tasks", "task_tags", "task_exclusions", "assignments"])?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE t.uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_task_row(self.conn, row)?)),
            None => Ok(None),
        }
    }

    fn list_tasks(&self, event_id: EventId, selector: &TaskSelector) -> RepoResult<Vec<Task>> {
        let (filter, binds) = task_filter_sql(event_id, selector);
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL} WHERE {filter} ORDER BY tt.name ASC, t.date ASC, t.uuid ASC;"
        ))?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(self.conn, row)?);
        }
        Ok(tasks)
    }

    fn update_task_overrides(&self, id: TaskId, num_people: u32, score: i64) -> RepoResult<()> {
        let assigned = assignee_count(self.conn, id)?;
        if assigned > num_people {
            return Err(RepoError::Conflict(format!(
                "task {id} has {assigned} assignees; cannot shrink to {num_people} slots"
            )));
        }
        let changed = self.conn.execute(
            "UPDATE tasks SET num_people = ?2, score = ?3 WHERE uuid = ?1;",
            params![id.to_string(), num_people, score],
        )?;
        if changed == 0 {
            return Err(task_not_found(id));
        }
        Ok(())
    }

    fn set_task_tags(&self, id: TaskId, tags: &BTreeSet<TagId>) -> RepoResult<()> {
        let event_id = owning_event(self.conn, EventScoped::Task, id)?;
        ensure_same_event(self.conn, EventScoped::Tag, event_id, tags)?;
        self.conn
            .execute("DELETE FROM task_tags WHERE task_uuid = ?1;", [id.to_string()])?;
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO task_tags (task_uuid, tag_uuid) VALUES (?1, ?2);")?;
        for tag in tags {
            stmt.execute(params![id.to_string(), tag.to_string()])?;
        }
        Ok(())
    }

    fn set_task_exclusions(
        &self,
        id: TaskId,
        participants: &BTreeSet<ParticipantId>,
    ) -> RepoResult<()> {
        let event_id = owning_event(self.conn, EventScoped::Task, id)?;
        ensure_same_event(self.conn, EventScoped::Participant, event_id, participants)?;
        self.conn.execute(
            "DELETE FROM task_exclusions WHERE task_uuid = ?1;",
            [id.to_string()],
        )?;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO task_exclusions (task_uuid, participant_uuid) VALUES (?1, ?2);",
        )?;
        for participant in participants {
            stmt.execute(params![id.to_string(), participant.to_string()])?;
        }
        Ok(())
    }

    fn add_manual_assignment(&self, id: TaskId, participant_id: ParticipantId) -> RepoResult<()> {
        let num_people: i64 = self
            .conn
            .query_row(
                "SELECT num_people FROM tasks WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => task_not_found(id),
                other => other.into(),
            })?;
        if i64::from(assignee_count(self.conn, id)?) >= num_people {
            return Err(RepoError::Conflict(format!("task {id} is already full")));
        }

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO assignments (participant_uuid, task_uuid, automatic)
             VALUES (?1, ?2, ?3);",
            params![participant_id.to_string(), id.to_string(), bool_to_int(false)],
        )?;
        if inserted == 0 {
            return Err(RepoError::Conflict(format!(
                "participant {participant_id} is already assigned to task {id}"
            )));
        }
        Ok(())
    }

    fn remove_assignment(&self, id: TaskId, participant_id: ParticipantId) -> RepoResult<()> {
        let deleted = self.conn.execute(
            "DELETE FROM assignments WHERE task_uuid = ?1 AND participant_uuid = ?2;",
            params![id.to_string(), participant_id.to_string()],
        )?;
        if deleted == 0 {
            return Err(RepoError::NotFound {
                entity: "assignment",
                id: participant_id,
            });
        }
        Ok(())
    }
}

fn parse_task_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Task> {
    let id = uuid_column(row, "uuid")?;
    let key = id.to_string();
    Ok(Task {
        id,
        task_type_id: uuid_column(row, "task_type_uuid")?,
        date: row.get("date")?,
        num_people: count_column(row, "num_people")?,
        score: row.get("score")?,
        tags: load_id_set(
            conn,
            "SELECT tag_uuid FROM task_tags WHERE task_uuid = ?1;",
            &key,
            "task_tags.tag_uuid",
        )?,
        do_not_assign_to: load_id_set(
            conn,
            "SELECT participant_uuid FROM task_exclusions WHERE task_uuid = ?1;",
            &key,
            "task_exclusions.participant_uuid",
        )?,
        assignees: load_assignments(conn, id)?,
    })
}

fn load_assignments(conn: &Connection, task_id: TaskId) -> RepoResult<Vec<Assignment>> {
    let mut stmt = conn.prepare_cached(
        "SELECT participant_uuid, automatic
         FROM assignments
         WHERE task_uuid = ?1
         ORDER BY participant_uuid ASC;",
    )?;
    let mut rows = stmt.query([task_id.to_string()])?;
    let mut assignments = Vec::new();
    while let Some(row) = rows.next()? {
        let automatic = match row.get::<_, i64>("automatic")? {
            0 => false,
            1 => true,
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid automatic value `{other}` in assignments.automatic"
                )));
            }
        };
        assignments.push(Assignment {
            participant_id: uuid_column(row, "participant_uuid")?,
            task_id,
            automatic,
        });
    }
    Ok(assignments)
}

fn assignee_count(conn: &Connection, id: TaskId) -> RepoResult<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM assignments WHERE task_uuid = ?1;",
        [id.to_string()],
        |row| row.get(0),
    )?;
    u32::try_from(count)
        .map_err(|_| RepoError::InvalidData(format!("invalid assignee count `{count}`")))
}

fn task_not_found(id: TaskId) -> RepoError {
    RepoError::NotFound { entity: "task", id }
}
