#![allow(dead_code)]

use chrono::NaiveDate;
use dicpick_core::repo::event_repo::{EventRepository, SqliteEventRepository};
use dicpick_core::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use dicpick_core::{
    open_db_in_memory, AssignOptions, AssignReport, AssignmentService, DateRange, Event,
    Participant, ParticipantId, Tag, TagId, Task, TaskSelector, TaskType, TaskTypeService,
};
use rusqlite::Connection;
use std::collections::BTreeSet;

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 8, d).unwrap()
}

pub fn range(start: u32, end: u32) -> DateRange {
    DateRange::new(day(start), day(end)).unwrap()
}

/// In-memory store with one event spanning August 1-31, 2016.
pub struct Fixture {
    pub conn: Connection,
    pub event: Event,
}

impl Fixture {
    pub fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let event = Event::new("Playa 2016", "playa16", range(1, 31));
        SqliteEventRepository::try_new(&conn)
            .unwrap()
            .create_event(&event)
            .unwrap();
        Self { conn, event }
    }

    pub fn tag(&self, name: &str) -> TagId {
        let tag = Tag::new(self.event.id, name);
        self.events().create_tag(&tag).unwrap()
    }

    pub fn participant(&self, name: &str) -> ParticipantId {
        self.participant_with(name, range(1, 31), &[], 0)
    }

    pub fn participant_with(
        &self,
        name: &str,
        available: DateRange,
        tags: &[TagId],
        initial_score: i64,
    ) -> ParticipantId {
        let mut participant = Participant::new(self.event.id, name, available);
        participant.tags = tags.iter().copied().collect();
        participant.initial_score = initial_score;
        self.events().create_participant(&participant).unwrap()
    }

    /// Records that `who` must not share a task with `others`.
    pub fn conflict(&self, who: ParticipantId, others: &[ParticipantId]) {
        let others: BTreeSet<ParticipantId> = others.iter().copied().collect();
        self.events()
            .set_participant_conflicts(who, &others)
            .unwrap();
    }

    pub fn task_type(
        &mut self,
        name: &str,
        dates: DateRange,
        num_people: u32,
        score: i64,
        tags: &[TagId],
    ) -> TaskType {
        let mut task_type = TaskType::new(self.event.id, name, dates, num_people, score);
        task_type.tags = tags.iter().copied().collect();
        TaskTypeService::new(&mut self.conn)
            .create_task_type(&task_type)
            .unwrap();
        task_type
    }

    pub fn tasks(&self, selector: &TaskSelector) -> Vec<Task> {
        SqliteTaskRepository::try_new(&self.conn)
            .unwrap()
            .list_tasks(self.event.id, selector)
            .unwrap()
    }

    pub fn all_tasks(&self) -> Vec<Task> {
        self.tasks(&TaskSelector::all())
    }

    pub fn assign_manually(&mut self, task: &Task, participant: ParticipantId) {
        AssignmentService::new(&mut self.conn)
            .assign_manually(self.event.id, task.id, participant)
            .unwrap();
    }

    pub fn run(&mut self, selector: &TaskSelector, seed: u64) -> AssignReport {
        AssignmentService::with_options(&mut self.conn, AssignOptions::seeded(seed))
            .assign(self.event.id, selector)
            .unwrap()
    }

    pub fn assignment_count(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM assignments;", [], |row| row.get(0))
            .unwrap()
    }

    /// Creates a second event in the same store.
    pub fn other_event(&self, slug: &str) -> Event {
        let event = Event::new("Other", slug, range(1, 31));
        self.events().create_event(&event).unwrap();
        event
    }

    pub fn events(&self) -> SqliteEventRepository<'_> {
        SqliteEventRepository::try_new(&self.conn).unwrap()
    }
}
