//! Sample event for local experiments.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use dicpick_core::repo::event_repo::{EventRepository, SqliteEventRepository};
use dicpick_core::service::task_type_service::create_task_type_in;
use dicpick_core::{open_db, DateRange, Event, Participant, ParticipantId, Tag, TagId, TaskType};
use log::info;
use rusqlite::{Connection, TransactionBehavior};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Clone, Copy)]
struct SampleTaskType {
    name: &'static str,
    num_people: u32,
    score: i64,
    tag: Option<&'static str>,
}

const TASK_TYPES: &[SampleTaskType] = &[
    SampleTaskType {
        name: "Morning Camp Manager",
        num_people: 1,
        score: 10,
        tag: Some("camp manager"),
    },
    SampleTaskType {
        name: "Evening Camp Manager",
        num_people: 1,
        score: 10,
        tag: Some("camp manager"),
    },
    SampleTaskType {
        name: "Dinner Head Chef",
        num_people: 1,
        score: 20,
        tag: Some("returner"),
    },
    SampleTaskType {
        name: "Dinner Sous Chef",
        num_people: 3,
        score: 20,
        tag: None,
    },
];

/// (name, tags, arrives on day offset)
const PEOPLE: &[(&str, &[&str], i64)] = &[
    ("Avery", &["camp manager", "returner"], 0),
    ("Blake", &["camp manager"], 0),
    ("Casey", &["returner", "early arriver"], 0),
    ("Devon", &[], 2),
    ("Emery", &["returner"], 1),
    ("Finley", &["camp manager", "early arriver"], 0),
    ("Harper", &[], 0),
    ("Jordan", &["returner"], 3),
    ("Kendall", &[], 0),
    ("Logan", &["camp manager"], 4),
];

/// Creates the sample event with tags, participants and task types, then
/// prints its id as JSON.
pub fn seed(db: &Path) -> Result<()> {
    let mut conn =
        open_db(db).with_context(|| format!("Failed to open database {}", db.display()))?;
    let event = sample_event()?;
    seed_event(&mut conn, &event, TASK_TYPES)
        .context("Failed to seed the sample event (was the demo already seeded?)")?;

    info!(
        "event=demo_seeded module=cli event_id={} participants={} task_types={}",
        event.id,
        PEOPLE.len(),
        TASK_TYPES.len()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "event_id": event.id, "slug": event.slug }))?
    );
    Ok(())
}

fn sample_event() -> Result<Event> {
    let range = DateRange::new(date(2016, 8, 24)?, date(2016, 9, 5)?)?;
    Ok(Event::new("Burning Man 2016", "bm2016", range))
}

/// Writes `event` with its tags, people and `task_types` in one transaction.
fn seed_event(conn: &mut Connection, event: &Event, task_types: &[SampleTaskType]) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    {
        let repo = SqliteEventRepository::try_new(&tx)?;
        repo.create_event(event)?;

        let mut tags = Vec::new();
        for name in ["camp manager", "returner", "early arriver"] {
            let tag = Tag::new(event.id, name);
            repo.create_tag(&tag)?;
            tags.push(tag);
        }

        let (start, end) = (event.date_range.start(), event.date_range.end());
        let mut ids = Vec::new();
        for (name, tag_names, arrival) in PEOPLE {
            let arrives = start + chrono::Duration::days(*arrival);
            let mut participant = Participant::new(event.id, *name, DateRange::new(arrives, end)?);
            participant.tags = tag_ids(&tags, tag_names);
            ids.push(repo.create_participant(&participant)?);
        }
        keep_apart(&repo, &ids)?;

        for sample in task_types {
            let mut task_type = TaskType::new(
                event.id,
                sample.name,
                event.date_range,
                sample.num_people,
                sample.score,
            );
            task_type.tags = tag_ids(&tags, sample.tag.as_slice());
            create_task_type_in(&tx, &task_type)
                .with_context(|| format!("Failed to create task type `{}`", sample.name))?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// The first two participants should not share a shift.
fn keep_apart(repo: &SqliteEventRepository<'_>, ids: &[ParticipantId]) -> Result<()> {
    if let [first, second, ..] = ids {
        repo.set_participant_conflicts(*first, &BTreeSet::from([*second]))?;
    }
    Ok(())
}

fn tag_ids(tags: &[Tag], names: &[&str]) -> BTreeSet<TagId> {
    tags.iter()
        .filter(|tag| names.contains(&tag.name.as_str()))
        .map(|tag| tag.id)
        .collect()
}

fn date(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("invalid date {year}-{month}-{day}"))
}
