//! Event, tag and participant persistence.
//!
//! # Responsibility
//! - Store the scheduling universe the engine reads: events, their tags and
//!   their participants.
//! - Report each participant's score standing.
//!
//! # Invariants
//! - Tag and conflict links only reference rows of the participant's own
//!   event; anything else is a `Conflict`.
//! - Conflict lists are stored one direction per row, as entered.

use super::{
    count_column, ensure_same_event, ensure_tables, owning_event, uuid_column, EventScoped,
    RepoError, RepoResult,
};
use crate::model::date_range::DateRange;
use crate::model::event::{Event, EventId, Tag, TagId};
use crate::model::participant::{Participant, ParticipantId};
use crate::model::ModelValidationError;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Score standing of one participant across every task they hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantScore {
    pub participant_id: ParticipantId,
    pub name: String,
    pub initial_score: i64,
    /// Sum of the scores of assigned tasks, manual and automatic.
    pub task_score: i64,
    /// `initial_score + task_score`; the value the engine ranks by.
    pub total_score: i64,
    pub num_tasks: u32,
}

/// Repository interface for the event universe.
pub trait EventRepository {
    fn create_event(&self, event: &Event) -> RepoResult<EventId>;
    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>>;
    fn create_tag(&self, tag: &Tag) -> RepoResult<TagId>;
    /// Tags of one event, sorted by name.
    fn list_tags(&self, event_id: EventId) -> RepoResult<Vec<Tag>>;
    /// Inserts the participant together with its tag and conflict links.
    fn create_participant(&self, participant: &Participant) -> RepoResult<ParticipantId>;
    fn get_participant(&self, id: ParticipantId) -> RepoResult<Option<Participant>>;
    /// Participants of one event, sorted by name.
    fn list_participants(&self, event_id: EventId) -> RepoResult<Vec<Participant>>;
    /// Replaces the full tag set of one participant. Tags must belong to its event.
    fn set_participant_tags(&self, id: ParticipantId, tags: &BTreeSet<TagId>) -> RepoResult<()>;
    /// Replaces the full do-not-assign-with list of one participant.
    fn set_participant_conflicts(
        &self,
        id: ParticipantId,
        others: &BTreeSet<ParticipantId>,
    ) -> RepoResult<()>;
    /// Score standing of every participant of one event, sorted by name.
    fn list_participant_scores(&self, event_id: EventId) -> RepoResult<Vec<ParticipantScore>>;
}

/// SQLite-backed event repository.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(
            conn,
            &[
                "events",
                "tags",
                "participants",
                "participant_tags",
                "participant_conflicts",
            ],
        )?;
        Ok(Self { conn })
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn create_event(&self, event: &Event) -> RepoResult<EventId> {
        event.validate()?;
        self.conn.execute(
            "INSERT INTO events (uuid, name, slug, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                event.id.to_string(),
                event.name.as_str(),
                event.slug.as_str(),
                event.date_range.start(),
                event.date_range.end(),
            ],
        )?;
        Ok(event.id)
    }

    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>> {
        let row = self
            .conn
            .query_row(
                "SELECT uuid, name, slug, start_date, end_date FROM events WHERE uuid = ?1;",
                [id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>("name")?,
                        row.get::<_, String>("slug")?,
                        row.get::<_, NaiveDate>("start_date")?,
                        row.get::<_, NaiveDate>("end_date")?,
                    ))
                },
            )
            .optional()?;

        let Some((name, slug, start, end)) = row else {
            return Ok(None);
        };
        Ok(Some(Event {
            id,
            name,
            slug,
            date_range: stored_range(start, end, "events")?,
        }))
    }

    fn create_tag(&self, tag: &Tag) -> RepoResult<TagId> {
        tag.validate()?;
        self.conn.execute(
            "INSERT INTO tags (uuid, event_uuid, name) VALUES (?1, ?2, ?3);",
            params![tag.id.to_string(), tag.event_id.to_string(), tag.name.as_str()],
        )?;
        Ok(tag.id)
    }

    fn list_tags(&self, event_id: EventId) -> RepoResult<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name FROM tags WHERE event_uuid = ?1 ORDER BY name ASC, uuid ASC;",
        )?;
        let mut rows = stmt.query([event_id.to_string()])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(Tag {
                id: uuid_column(row, "uuid")?,
                event_id,
                name: row.get("name")?,
            });
        }
        Ok(tags)
    }

    fn create_participant(&self, participant: &Participant) -> RepoResult<ParticipantId> {
        participant.validate()?;
        ensure_same_event(self.conn, EventScoped::Tag, participant.event_id, &participant.tags)?;
        ensure_same_event(
            self.conn,
            EventScoped::Participant,
            participant.event_id,
            &participant.do_not_assign_with,
        )?;
        self.conn.execute(
            "INSERT INTO participants (uuid, event_uuid, name, start_date, end_date, initial_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                participant.id.to_string(),
                participant.event_id.to_string(),
                participant.name.as_str(),
                participant.date_range.start(),
                participant.date_range.end(),
                participant.initial_score,
            ],
        )?;
        insert_participant_tags(self.conn, participant.id, &participant.tags)?;
        insert_participant_conflicts(self.conn, participant.id, &participant.do_not_assign_with)?;
        Ok(participant.id)
    }

    fn get_participant(&self, id: ParticipantId) -> RepoResult<Option<Participant>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, event_uuid, name, start_date, end_date, initial_score
             FROM participants
             WHERE uuid = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(self.hydrate_participant(row)?)),
            None => Ok(None),
        }
    }

    fn list_participants(&self, event_id: EventId) -> RepoResult<Vec<Participant>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, event_uuid, name, start_date, end_date, initial_score
             FROM participants
             WHERE event_uuid = ?1
             ORDER BY name ASC, uuid ASC;",
        )?;
        let mut rows = stmt.query([event_id.to_string()])?;
        let mut participants = Vec::new();
        while let Some(row) = rows.next()? {
            participants.push(self.hydrate_participant(row)?);
        }
        Ok(participants)
    }

    fn set_participant_tags(&self, id: ParticipantId, tags: &BTreeSet<TagId>) -> RepoResult<()> {
        let event_id = owning_event(self.conn, EventScoped::Participant, id)?;
        ensure_same_event(self.conn, EventScoped::Tag, event_id, tags)?;
        self.conn.execute(
            "DELETE FROM participant_tags WHERE participant_uuid = ?1;",
            [id.to_string()],
        )?;
        insert_participant_tags(self.conn, id, tags)
    }

    fn set_participant_conflicts(
        &self,
        id: ParticipantId,
        others: &BTreeSet<ParticipantId>,
    ) -> RepoResult<()> {
        if others.contains(&id) {
            return Err(ModelValidationError::SelfConflict.into());
        }
        let event_id = owning_event(self.conn, EventScoped::Participant, id)?;
        ensure_same_event(self.conn, EventScoped::Participant, event_id, others)?;
        self.conn.execute(
            "DELETE FROM participant_conflicts WHERE participant_uuid = ?1;",
            [id.to_string()],
        )?;
        insert_participant_conflicts(self.conn, id, others)
    }

    fn list_participant_scores(&self, event_id: EventId) -> RepoResult<Vec<ParticipantScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                p.uuid,
                p.name,
                p.initial_score,
                COALESCE((
                    SELECT SUM(t.score)
                    FROM assignments a
                    INNER JOIN tasks t ON t.uuid = a.task_uuid
                    WHERE a.participant_uuid = p.uuid
                ), 0) AS task_score,
                (
                    SELECT COUNT(*)
                    FROM assignments a
                    WHERE a.participant_uuid = p.uuid
                ) AS num_tasks
             FROM participants p
             WHERE p.event_uuid = ?1
             ORDER BY p.name ASC, p.uuid ASC;",
        )?;
        let mut rows = stmt.query([event_id.to_string()])?;
        let mut scores = Vec::new();
        while let Some(row) = rows.next()? {
            let initial_score: i64 = row.get("initial_score")?;
            let task_score: i64 = row.get("task_score")?;
            scores.push(ParticipantScore {
                participant_id: uuid_column(row, "uuid")?,
                name: row.get("name")?,
                initial_score,
                task_score,
                total_score: initial_score + task_score,
                num_tasks: count_column(row, "num_tasks")?,
            });
        }
        Ok(scores)
    }
}

impl SqliteEventRepository<'_> {
    fn hydrate_participant(&self, row: &Row<'_>) -> RepoResult<Participant> {
        let id = uuid_column(row, "uuid")?;
        let id_text = id.to_string();
        Ok(Participant {
            id,
            event_id: uuid_column(row, "event_uuid")?,
            name: row.get("name")?,
            date_range: stored_range(row.get("start_date")?, row.get("end_date")?, "participants")?,
            tags: load_id_set(
                self.conn,
                "SELECT tag_uuid FROM participant_tags WHERE participant_uuid = ?1;",
                &id_text,
                "participant_tags.tag_uuid",
            )?,
            initial_score: row.get("initial_score")?,
            do_not_assign_with: load_id_set(
                self.conn,
                "SELECT other_uuid FROM participant_conflicts WHERE participant_uuid = ?1;",
                &id_text,
                "participant_conflicts.other_uuid",
            )?,
        })
    }
}

pub(crate) fn stored_range(
    start: NaiveDate,
    end: NaiveDate,
    table: &'static str,
) -> RepoResult<DateRange> {
    DateRange::new(start, end)
        .map_err(|err| RepoError::InvalidData(format!("{err} in {table}.start_date/end_date")))
}

/// Runs a single-column uuid query bound to `key` and collects the ids.
pub(crate) fn load_id_set(
    conn: &Connection,
    sql: &str,
    key: &str,
    column: &'static str,
) -> RepoResult<BTreeSet<uuid::Uuid>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query([key])?;
    let mut ids = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.insert(super::parse_uuid(&value, column)?);
    }
    Ok(ids)
}

fn insert_participant_tags(
    conn: &Connection,
    id: ParticipantId,
    tags: &BTreeSet<TagId>,
) -> RepoResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO participant_tags (participant_uuid, tag_uuid) VALUES (?1, ?2);",
    )?;
    for tag in tags {
        stmt.execute(params![id.to_string(), tag.to_string()])?;
    }
    Ok(())
}

fn insert_participant_conflicts(
    conn: &Connection,
    id: ParticipantId,
    others: &BTreeSet<ParticipantId>,
) -> RepoResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO participant_conflicts (participant_uuid, other_uuid) VALUES (?1, ?2);",
    )?;
    for other in others {
        stmt.execute(params![id.to_string(), other.to_string()])?;
    }
    Ok(())
}
