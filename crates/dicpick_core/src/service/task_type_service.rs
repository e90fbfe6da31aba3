//! Task-type use-case service.
//!
//! # Responsibility
//! - Create and edit task types.
//! - Propagate every edit onto the type's task rows in the same transaction.
//!
//! # Invariants
//! - A type edit and its propagation commit together or not at all.
//! - Task types never move between events.
//! - Type tags belong to the type's event.

use super::propagation::{propagate_task_type, PropagationSummary};
use crate::model::event::{EventId, TagId};
use crate::model::task_type::{TaskType, TaskTypeId};
use crate::model::ModelValidationError;
use crate::repo::event_repo::{EventRepository, SqliteEventRepository};
use crate::repo::task_type_repo::{SqliteTaskTypeRepository, TaskTypeRepository};
use crate::repo::RepoError;
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from task-type use-cases.
#[derive(Debug)]
pub enum TaskTypeServiceError {
    Validation(ModelValidationError),
    EventNotFound(EventId),
    TaskTypeNotFound(TaskTypeId),
    /// Update payload names a different event than the stored type.
    EventMismatch {
        task_type_id: TaskTypeId,
        stored: EventId,
        requested: EventId,
    },
    /// Tag does not exist in the type's event.
    ForeignTag { tag_id: TagId, event_id: EventId },
    Repo(RepoError),
}

impl Display for TaskTypeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::EventNotFound(id) => write!(f, "event not found: {id}"),
            Self::TaskTypeNotFound(id) => write!(f, "task type not found: {id}"),
            Self::EventMismatch {
                task_type_id,
                stored,
                requested,
            } => write!(
                f,
                "task type {task_type_id} belongs to event {stored}, not {requested}"
            ),
            Self::ForeignTag { tag_id, event_id } => {
                write!(f, "tag {tag_id} is not defined in event {event_id}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskTypeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TaskTypeServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<ModelValidationError> for TaskTypeServiceError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<rusqlite::Error> for TaskTypeServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Task-type service bound to one open connection.
pub struct TaskTypeService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> TaskTypeService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Inserts `task_type` and creates one task per date of its range.
    pub fn create_task_type(
        &mut self,
        task_type: &TaskType,
    ) -> Result<PropagationSummary, TaskTypeServiceError> {
        task_type.validate()?;
        let started_at = Instant::now();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = create_in(&tx, task_type);
        finish("create", task_type.id, started_at, tx, outcome)
    }

    /// Replaces the stored type row and propagates the differences.
    ///
    /// Date range changes delete and create task rows, `num_people` and
    /// `score` are reset on every task, and only the tag delta is mirrored.
    pub fn update_task_type(
        &mut self,
        task_type: &TaskType,
    ) -> Result<PropagationSummary, TaskTypeServiceError> {
        task_type.validate()?;
        let started_at = Instant::now();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = update_in(&tx, task_type);
        finish("update", task_type.id, started_at, tx, outcome)
    }

    pub fn get_task_type(&self, id: TaskTypeId) -> Result<TaskType, TaskTypeServiceError> {
        SqliteTaskTypeRepository::try_new(self.conn)?
            .get_task_type(id)?
            .ok_or(TaskTypeServiceError::TaskTypeNotFound(id))
    }

    /// Lists the event's task types ordered by name.
    pub fn list_task_types(&self, event_id: EventId) -> Result<Vec<TaskType>, TaskTypeServiceError> {
        Ok(SqliteTaskTypeRepository::try_new(self.conn)?.list_task_types(event_id)?)
    }
}

/// Validates and inserts `task_type` with its tasks on `conn`.
///
/// Does not open or commit a transaction; the caller owns it.
pub fn create_task_type_in(
    conn: &Connection,
    task_type: &TaskType,
) -> Result<PropagationSummary, TaskTypeServiceError> {
    task_type.validate()?;
    create_in(conn, task_type)
}

fn create_in(
    conn: &Connection,
    task_type: &TaskType,
) -> Result<PropagationSummary, TaskTypeServiceError> {
    ensure_event_tags(conn, task_type.event_id, &task_type.tags)?;

    let repo = SqliteTaskTypeRepository::try_new(conn)?;
    repo.insert_task_type(task_type)?;
    Ok(propagate_task_type(&repo, task_type, None)?)
}

fn update_in(
    conn: &Connection,
    task_type: &TaskType,
) -> Result<PropagationSummary, TaskTypeServiceError> {
    let repo = SqliteTaskTypeRepository::try_new(conn)?;
    let stored = repo
        .get_task_type(task_type.id)?
        .ok_or(TaskTypeServiceError::TaskTypeNotFound(task_type.id))?;
    if stored.event_id != task_type.event_id {
        return Err(TaskTypeServiceError::EventMismatch {
            task_type_id: task_type.id,
            stored: stored.event_id,
            requested: task_type.event_id,
        });
    }
    ensure_event_tags(conn, task_type.event_id, &task_type.tags)?;

    repo.update_task_type(task_type)?;
    repo.set_task_type_tags(task_type.id, &task_type.tags)?;
    Ok(propagate_task_type(&repo, task_type, Some(&stored.tags))?)
}

fn ensure_event_tags(
    conn: &Connection,
    event_id: EventId,
    tags: &BTreeSet<TagId>,
) -> Result<(), TaskTypeServiceError> {
    let events = SqliteEventRepository::try_new(conn)?;
    if events.get_event(event_id)?.is_none() {
        return Err(TaskTypeServiceError::EventNotFound(event_id));
    }
    let known: BTreeSet<TagId> = events
        .list_tags(event_id)?
        .into_iter()
        .map(|tag| tag.id)
        .collect();
    match tags.difference(&known).next() {
        Some(tag_id) => Err(TaskTypeServiceError::ForeignTag {
            tag_id: *tag_id,
            event_id,
        }),
        None => Ok(()),
    }
}

fn finish(
    trigger: &'static str,
    task_type_id: TaskTypeId,
    started_at: Instant,
    tx: rusqlite::Transaction<'_>,
    outcome: Result<PropagationSummary, TaskTypeServiceError>,
) -> Result<PropagationSummary, TaskTypeServiceError> {
    let committed = outcome.and_then(|summary| {
        tx.commit()?;
        Ok(summary)
    });
    match &committed {
        Ok(summary) => info!(
            "event=propagate_task_type module=service status=ok trigger={} task_type_id={} created={} deleted={} updated={} tags_added={} tags_removed={} duration_ms={}",
            trigger,
            task_type_id,
            summary.created,
            summary.deleted,
            summary.updated,
            summary.tags_added,
            summary.tags_removed,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=propagate_task_type module=service status=error trigger={} task_type_id={} duration_ms={} error={}",
            trigger,
            task_type_id,
            started_at.elapsed().as_millis(),
            err
        ),
    }
    committed
}
