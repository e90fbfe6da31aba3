//! Task type persistence and the task-row primitives propagation builds on.
//!
//! # Responsibility
//! - Store task type rows and their default tag sets.
//! - Offer bulk task-row mutations scoped to one task type.
//!
//! # Invariants
//! - `UNIQUE (task_type_uuid, date)` guarantees one task per type and date.
//! - Resetting defaults never leaves a task with more assignees than slots.

use super::event_repo::{load_id_set, stored_range};
use super::{count_column, ensure_tables, uuid_column, RepoError, RepoResult};
use crate::model::event::{EventId, TagId};
use crate::model::task_type::{TaskType, TaskTypeId};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;
use uuid::Uuid;

const TASK_TYPE_SELECT_SQL: &str = "SELECT
    uuid,
    event_uuid,
    name,
    start_date,
    end_date,
    num_people,
    score
FROM task_types";

/// Repository interface for task types and their task rows.
pub trait TaskTypeRepository {
    /// Inserts the type row and its tag links. Does not create task rows.
    fn insert_task_type(&self, task_type: &TaskType) -> RepoResult<TaskTypeId>;
    /// Overwrites name, date range, people count and score. Tags untouched.
    fn update_task_type(&self, task_type: &TaskType) -> RepoResult<()>;
    fn get_task_type(&self, id: TaskTypeId) -> RepoResult<Option<TaskType>>;
    /// Task types of one event, sorted by name.
    fn list_task_types(&self, event_id: EventId) -> RepoResult<Vec<TaskType>>;
    /// Replaces the default tag set of the type row only.
    fn set_task_type_tags(&self, id: TaskTypeId, tags: &BTreeSet<TagId>) -> RepoResult<()>;
    fn list_task_dates(&self, id: TaskTypeId) -> RepoResult<BTreeSet<NaiveDate>>;
    /// Deletes task rows (and, by cascade, their assignments) on `dates`.
    fn delete_tasks_on_dates(&self, id: TaskTypeId, dates: &BTreeSet<NaiveDate>)
        -> RepoResult<usize>;
    /// Creates one task row per date with the given defaults.
    fn insert_tasks(
        &self,
        id: TaskTypeId,
        dates: &BTreeSet<NaiveDate>,
        num_people: u32,
        score: i64,
        tags: &BTreeSet<TagId>,
    ) -> RepoResult<usize>;
    /// Overwrites `num_people` and `score` on every task of the type.
    ///
    /// Fails with `Conflict` when a task already holds more assignees than
    /// `num_people`.
    fn reset_task_defaults(&self, id: TaskTypeId, num_people: u32, score: i64)
        -> RepoResult<usize>;
    /// Adds each tag to every task of the type; existing links are kept.
    fn add_tags_to_tasks(&self, id: TaskTypeId, tags: &BTreeSet<TagId>) -> RepoResult<usize>;
    /// Removes each tag from every task of the type.
    fn remove_tags_from_tasks(&self, id: TaskTypeId, tags: &BTreeSet<TagId>) -> RepoResult<usize>;
}

/// SQLite-backed task type repository.
pub struct SqliteTaskTypeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskTypeRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["task_types", "task_type_tags", "tasks", "task_tags"])?;
        Ok(Self { conn })
    }
}

impl TaskTypeRepository for SqliteTaskTypeRepository<'_> {
    fn insert_task_type(&self, task_type: &TaskType) -> RepoResult<TaskTypeId> {
        task_type.validate()?;
        self.conn.execute(
            "INSERT INTO task_types (uuid, event_uuid, name, start_date, end_date, num_people, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                task_type.id.to_string(),
                task_type.event_id.to_string(),
                task_type.name.as_str(),
                task_type.date_range.start(),
                task_type.date_range.end(),
                task_type.num_people,
                task_type.score,
            ],
        )?;
        insert_type_tags(self.conn, task_type.id, &task_type.tags)?;
        Ok(task_type.id)
    }

    fn update_task_type(&self, task_type: &TaskType) -> RepoResult<()> {
        task_type.validate()?;
        let changed = self.conn.execute(
            "UPDATE task_types
             SET
                name = ?2,
                start_date = ?3,
                end_date = ?4,
                num_people = ?5,
                score = ?6
             WHERE uuid = ?1;",
            params![
                task_type.id.to_string(),
                task_type.name.as_str(),
                task_type.date_range.start(),
                task_type.date_range.end(),
                task_type.num_people,
                task_type.score,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "task type",
                id: task_type.id,
            });
        }
        Ok(())
    }

    fn get_task_type(&self, id: TaskTypeId) -> RepoResult<Option<TaskType>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_TYPE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_task_type_row(self.conn, row)?)),
            None => Ok(None),
        }
    }

    fn list_task_types(&self, event_id: EventId) -> RepoResult<Vec<TaskType>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_TYPE_SELECT_SQL} WHERE event_uuid = ?1 ORDER BY name ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([event_id.to_string()])?;
        let mut task_types = Vec::new();
        while let Some(row) = rows.next()? {
            task_types.push(parse_task_type_row(self.conn, row)?);
        }
        Ok(task_types)
    }

    fn set_task_type_tags(&self, id: TaskTypeId, tags: &BTreeSet<TagId>) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM task_type_tags WHERE task_type_uuid = ?1;",
            [id.to_string()],
        )?;
        insert_type_tags(self.conn, id, tags)
    }

    fn list_task_dates(&self, id: TaskTypeId) -> RepoResult<BTreeSet<NaiveDate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date FROM tasks WHERE task_type_uuid = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut dates = BTreeSet::new();
        while let Some(row) = rows.next()? {
            dates.insert(row.get::<_, NaiveDate>(0)?);
        }
        Ok(dates)
    }

    fn delete_tasks_on_dates(
        &self,
        id: TaskTypeId,
        dates: &BTreeSet<NaiveDate>,
    ) -> RepoResult<usize> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM tasks WHERE task_type_uuid = ?1 AND date = ?2;")?;
        let mut deleted = 0;
        for date in dates {
            deleted += stmt.execute(params![id.to_string(), date])?;
        }
        Ok(deleted)
    }

    fn insert_tasks(
        &self,
        id: TaskTypeId,
        dates: &BTreeSet<NaiveDate>,
        num_people: u32,
        score: i64,
        tags: &BTreeSet<TagId>,
    ) -> RepoResult<usize> {
        let mut insert_task = self.conn.prepare_cached(
            "INSERT INTO tasks (uuid, task_type_uuid, date, num_people, score)
             VALUES (?1, ?2, ?3, ?4, ?5);",
        )?;
        let mut insert_tag = self
            .conn
            .prepare_cached("INSERT INTO task_tags (task_uuid, tag_uuid) VALUES (?1, ?2);")?;

        for date in dates {
            let task_id = Uuid::new_v4().to_string();
            insert_task.execute(params![task_id, id.to_string(), date, num_people, score])?;
            for tag in tags {
                insert_tag.execute(params![task_id, tag.to_string()])?;
            }
        }
        Ok(dates.len())
    }

    fn reset_task_defaults(
        &self,
        id: TaskTypeId,
        num_people: u32,
        score: i64,
    ) -> RepoResult<usize> {
        let overfull: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM tasks t
             WHERE t.task_type_uuid = ?1
               AND (SELECT COUNT(*) FROM assignments a WHERE a.task_uuid = t.uuid) > ?2;",
            params![id.to_string(), num_people],
            |row| row.get(0),
        )?;
        if overfull > 0 {
            return Err(RepoError::Conflict(format!(
                "{overfull} task(s) of type {id} hold more than {num_people} assignees"
            )));
        }

        let updated = self.conn.execute(
            "UPDATE tasks SET num_people = ?2, score = ?3 WHERE task_type_uuid = ?1;",
            params![id.to_string(), num_people, score],
        )?;
        Ok(updated)
    }

    fn add_tags_to_tasks(&self, id: TaskTypeId, tags: &BTreeSet<TagId>) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO task_tags (task_uuid, tag_uuid)
             SELECT uuid, ?2 FROM tasks WHERE task_type_uuid = ?1;",
        )?;
        let mut added = 0;
        for tag in tags {
            added += stmt.execute(params![id.to_string(), tag.to_string()])?;
        }
        Ok(added)
    }

    fn remove_tags_from_tasks(&self, id: TaskTypeId, tags: &BTreeSet<TagId>) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare_cached(
            "DELETE FROM task_tags
             WHERE tag_uuid = ?2
               AND task_uuid IN (SELECT uuid FROM tasks WHERE task_type_uuid = ?1);",
        )?;
        let mut removed = 0;
        for tag in tags {
            removed += stmt.execute(params![id.to_string(), tag.to_string()])?;
        }
        Ok(removed)
    }
}

fn parse_task_type_row(conn: &Connection, row: &Row<'_>) -> RepoResult<TaskType> {
    let id = uuid_column(row, "uuid")?;
    Ok(TaskType {
        id,
        event_id: uuid_column(row, "event_uuid")?,
        name: row.get("name")?,
        date_range: stored_range(row.get("start_date")?, row.get("end_date")?, "task_types")?,
        num_people: count_column(row, "num_people")?,
        score: row.get("score")?,
        tags: load_id_set(
            conn,
            "SELECT tag_uuid FROM task_type_tags WHERE task_type_uuid = ?1;",
            &id.to_string(),
            "task_type_tags.tag_uuid",
        )?,
    })
}

fn insert_type_tags(conn: &Connection, id: TaskTypeId, tags: &BTreeSet<TagId>) -> RepoResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO task_type_tags (task_type_uuid, tag_uuid) VALUES (?1, ?2);",
    )?;
    for tag in tags {
        stmt.execute(params![id.to_string(), tag.to_string()])?;
    }
    Ok(())
}
