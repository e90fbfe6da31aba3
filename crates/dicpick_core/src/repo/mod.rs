//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the scheduling store.
//! - Keep SQL details out of the engine and services.
//!
//! # Invariants
//! - Write paths validate model records before any SQL mutation.
//! - Read paths reject malformed persisted values with `InvalidData`
//!   instead of masking them.
//! - Repositories never open transactions themselves unless documented;
//!   services own transaction boundaries.

use crate::db::DbError;
use crate::model::ModelValidationError;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod event_repo;
pub mod schedule_repo;
pub mod task_repo;
pub mod task_type_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for scheduling persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Validation(ModelValidationError),
    Db(DbError),
    NotFound { entity: &'static str, id: Uuid },
    /// Write would break a storage invariant (full task, duplicate row, ...).
    Conflict(String),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(message) => write!(f, "conflicting write: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "scheduling store requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::Conflict(_) => None,
            Self::InvalidData(_) => None,
            Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn uuid_column(row: &Row<'_>, column: &'static str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    parse_uuid(&text, column)
}

pub(crate) fn count_column(row: &Row<'_>, column: &'static str) -> RepoResult<u32> {
    let value: i64 = row.get(column)?;
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid count `{value}` in {column}")))
}

/// Appends ` IN (?, ?, ...)` for `ids` and pushes their bind values.
///
/// An empty list renders `IN (NULL)`, which matches nothing.
pub(crate) fn push_uuid_in_list(sql: &mut String, binds: &mut Vec<Value>, ids: &[Uuid]) {
    if ids.is_empty() {
        sql.push_str(" IN (NULL)");
        return;
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    sql.push_str(&format!(" IN ({placeholders})"));
    binds.extend(ids.iter().map(|id| Value::Text(id.to_string())));
}

/// Rows that can be linked to other rows of the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventScoped {
    Tag,
    Participant,
    Task,
}

impl EventScoped {
    fn entity(self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Participant => "participant",
            Self::Task => "task",
        }
    }

    fn owner_sql(self) -> &'static str {
        match self {
            Self::Tag => "SELECT event_uuid FROM tags WHERE uuid = ?1;",
            Self::Participant => "SELECT event_uuid FROM participants WHERE uuid = ?1;",
            Self::Task => {
                "SELECT tt.event_uuid
                 FROM tasks t
                 INNER JOIN task_types tt ON tt.uuid = t.task_type_uuid
                 WHERE t.uuid = ?1;"
            }
        }
    }
}

/// Owning event of one row; `NotFound` when the row does not exist.
pub(crate) fn owning_event(conn: &Connection, kind: EventScoped, id: Uuid) -> RepoResult<Uuid> {
    let owner: Option<String> = conn
        .prepare_cached(kind.owner_sql())?
        .query_row([id.to_string()], |row| row.get(0))
        .optional()?;
    match owner {
        Some(value) => parse_uuid(&value, "event_uuid"),
        None => Err(RepoError::NotFound {
            entity: kind.entity(),
            id,
        }),
    }
}

/// Fails with `Conflict` unless every id in `ids` belongs to `event_id`.
pub(crate) fn ensure_same_event<'a>(
    conn: &Connection,
    kind: EventScoped,
    event_id: Uuid,
    ids: impl IntoIterator<Item = &'a Uuid>,
) -> RepoResult<()> {
    for &id in ids {
        let owner = owning_event(conn, kind, id)?;
        if owner != event_id {
            return Err(RepoError::Conflict(format!(
                "{} {id} belongs to event {owner}, not {event_id}",
                kind.entity()
            )));
        }
    }
    Ok(())
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
