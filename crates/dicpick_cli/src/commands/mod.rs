use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use dicpick_core::repo::event_repo::{EventRepository, SqliteEventRepository};
use dicpick_core::{
    default_log_level, open_db, AssignOptions, AssignmentService, EventId, TaskId, TaskSelector,
    TaskTypeId,
};
use log::info;
use serde_json::json;
use std::path::Path;

pub mod demo;

pub fn init_logging(level: Option<&str>, log_dir: Option<&Path>) -> Result<()> {
    let Some(log_dir) = log_dir else {
        return Ok(());
    };
    let Some(dir) = log_dir.to_str() else {
        bail!("log directory `{}` is not valid UTF-8", log_dir.display());
    };
    dicpick_core::init_logging(level.unwrap_or(default_log_level()), dir)
        .context("Failed to start logging")
}

/// Combines the CLI filters; no filter at all selects every task of the event.
pub fn selector(
    task_ids: Vec<TaskId>,
    task_type: Option<TaskTypeId>,
    date: Option<NaiveDate>,
) -> TaskSelector {
    let mut selector = if task_ids.is_empty() {
        TaskSelector::all()
    } else {
        TaskSelector::by_task_ids(task_ids)
    };
    if let Some(task_type) = task_type {
        selector = selector.with_task_type(task_type);
    }
    if let Some(date) = date {
        selector = selector.with_date(date);
    }
    selector
}

pub fn assign(
    db: &Path,
    event: EventId,
    selector: TaskSelector,
    seed: Option<u64>,
    strict: bool,
) -> Result<()> {
    let mut conn =
        open_db(db).with_context(|| format!("Failed to open database {}", db.display()))?;
    let mut options = AssignOptions {
        seed,
        ..AssignOptions::default()
    };
    if strict {
        options = options.strict();
    }

    info!("event=cli_command module=cli command=assign event_id={event}");
    let report = AssignmentService::with_options(&mut conn, options)
        .assign(event, &selector)
        .with_context(|| format!("Assignment run for event {event} failed"))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn clear(db: &Path, event: EventId, task_ids: &[TaskId], include_manual: bool) -> Result<()> {
    let mut conn =
        open_db(db).with_context(|| format!("Failed to open database {}", db.display()))?;

    info!("event=cli_command module=cli command=clear event_id={event}");
    let deleted = AssignmentService::new(&mut conn)
        .clear_assignments(event, task_ids, include_manual)
        .with_context(|| format!("Clearing assignments of event {event} failed"))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "event_id": event,
            "deleted": deleted,
            "include_manual": include_manual,
        }))?
    );
    Ok(())
}

pub fn scores(db: &Path, event: EventId) -> Result<()> {
    let conn = open_db(db).with_context(|| format!("Failed to open database {}", db.display()))?;
    let repo = SqliteEventRepository::try_new(&conn)?;
    if repo.get_event(event)?.is_none() {
        bail!("event {event} not found");
    }

    info!("event=cli_command module=cli command=scores event_id={event}");
    let scores = repo.list_participant_scores(event)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "event_id": event,
            "participants": scores,
        }))?
    );
    Ok(())
}
