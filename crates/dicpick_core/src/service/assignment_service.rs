//! Assignment use-case service.
//!
//! # Responsibility
//! - Run the assignment engine over an event's open tasks and persist the
//!   resulting automatic assignments.
//! - Clear automatic (or all) assignments of a set of tasks.
//! - Apply manual assignment edits.
//!
//! # Invariants
//! - Every run reads its snapshot and writes its rows inside one
//!   `BEGIN IMMEDIATE` transaction; concurrent runs serialize.
//! - Any error rolls the run back; nothing is partially written.
//! - Selectors and task ids are constrained to the owning event; anything
//!   outside it aborts the call.

use crate::assign::engine::{plan_assignments, PlannedAssignment};
use crate::assign::options::{AssignMode, AssignOptions};
use crate::assign::snapshot::ScheduleSnapshot;
use crate::assign::EngineError;
use crate::model::event::EventId;
use crate::model::participant::ParticipantId;
use crate::model::task::TaskId;
use crate::model::task_type::TaskTypeId;
use crate::repo::event_repo::{EventRepository, SqliteEventRepository};
use crate::repo::schedule_repo::{ScheduleRepository, SqliteScheduleRepository, TaskSelector};
use crate::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use crate::repo::RepoError;
use chrono::NaiveDate;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from assignment use-cases.
#[derive(Debug)]
pub enum AssignError {
    /// Strict mode: a slot could not be filled. The run was rolled back.
    NoEligibleParticipant {
        task_id: TaskId,
        task_type_id: TaskTypeId,
        date: NaiveDate,
    },
    EventNotFound(EventId),
    /// Selector, task or participant lies outside the event.
    ScopeMismatch {
        event_id: EventId,
        details: String,
    },
    /// Engine bookkeeping broke; the run was rolled back.
    InconsistentState(EngineError),
    Repo(RepoError),
}

impl Display for AssignError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEligibleParticipant {
                task_id,
                task_type_id,
                date,
            } => write!(
                f,
                "no eligible participant for task {task_id} (task type {task_type_id}) on {date}"
            ),
            Self::EventNotFound(id) => write!(f, "event not found: {id}"),
            Self::ScopeMismatch { event_id, details } => {
                write!(f, "outside event {event_id}: {details}")
            }
            Self::InconsistentState(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssignError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InconsistentState(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AssignError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for AssignError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

impl From<EngineError> for AssignError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::NoEligibleParticipant {
                task_id,
                task_type_id,
                date,
            } => Self::NoEligibleParticipant {
                task_id,
                task_type_id,
                date,
            },
            other => Self::InconsistentState(other),
        }
    }
}

/// Result of one committed assignment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignReport {
    pub event_id: EventId,
    /// New automatic assignments, in the order they were made.
    pub assignments: Vec<PlannedAssignment>,
    /// Tasks still under-filled after the run.
    pub unassignable: BTreeSet<TaskId>,
    pub tasks_examined: usize,
}

impl AssignReport {
    /// True when every examined task ended up full.
    pub fn is_complete(&self) -> bool {
        self.unassignable.is_empty()
    }
}

/// Assignment service bound to one open connection.
pub struct AssignmentService<'conn> {
    conn: &'conn mut Connection,
    options: AssignOptions,
}

impl<'conn> AssignmentService<'conn> {
    /// Creates a service with unseeded lenient options.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self::with_options(conn, AssignOptions::default())
    }

    pub fn with_options(conn: &'conn mut Connection, options: AssignOptions) -> Self {
        Self { conn, options }
    }

    pub fn options(&self) -> AssignOptions {
        self.options
    }

    /// Fills open slots of the tasks matching `selector` within `event_id`.
    ///
    /// The tie-break RNG is seeded from `options.seed` when set, otherwise
    /// from OS entropy.
    pub fn assign(
        &mut self,
        event_id: EventId,
        selector: &TaskSelector,
    ) -> Result<AssignReport, AssignError> {
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.assign_with_rng(event_id, selector, &mut rng)
    }

    /// Same as [`AssignmentService::assign`] with a caller-supplied RNG.
    pub fn assign_with_rng<G: Rng + ?Sized>(
        &mut self,
        event_id: EventId,
        selector: &TaskSelector,
        rng: &mut G,
    ) -> Result<AssignReport, AssignError> {
        let started_at = Instant::now();
        let mode = self.options.mode;
        info!(
            "event=assign_run module=service status=start event_id={} mode={}",
            event_id,
            mode_label(mode)
        );

        let outcome: Result<AssignReport, AssignError> = (|| {
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;
            let report = {
                let repo = SqliteScheduleRepository::try_new(&tx)?;
                run_assignment(&repo, event_id, selector, rng, mode)?
            };
            tx.commit()?;
            Ok(report)
        })();

        match &outcome {
            Ok(report) => info!(
                "event=assign_run module=service status=ok event_id={} examined={} assigned={} unassignable={} duration_ms={}",
                event_id,
                report.tasks_examined,
                report.assignments.len(),
                report.unassignable.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=assign_run module=service status=error event_id={} duration_ms={} error={}",
                event_id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        outcome
    }

    /// Deletes assignment rows of `task_ids`; automatic rows only unless
    /// `include_manual` is set. Returns the number of rows deleted.
    pub fn clear_assignments(
        &mut self,
        event_id: EventId,
        task_ids: &[TaskId],
        include_manual: bool,
    ) -> Result<usize, AssignError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = {
            let repo = SqliteScheduleRepository::try_new(&tx)?;
            clear_in(&repo, event_id, task_ids, include_manual)?
        };
        tx.commit()?;

        info!(
            "event=clear_assignments module=service status=ok event_id={} tasks={} include_manual={} deleted={}",
            event_id,
            task_ids.len(),
            include_manual,
            deleted
        );
        Ok(deleted)
    }

    /// Adds `participant_id` to `task_id` as a manual assignment.
    ///
    /// Eligibility is not checked; the task must have an open slot.
    pub fn assign_manually(
        &mut self,
        event_id: EventId,
        task_id: TaskId,
        participant_id: ParticipantId,
    ) -> Result<(), AssignError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_pair_in_event(&tx, event_id, task_id, participant_id)?;
        SqliteTaskRepository::try_new(&tx)?.add_manual_assignment(task_id, participant_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Removes one assignment row, automatic or manual.
    pub fn unassign(
        &mut self,
        event_id: EventId,
        task_id: TaskId,
        participant_id: ParticipantId,
    ) -> Result<(), AssignError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_pair_in_event(&tx, event_id, task_id, participant_id)?;
        SqliteTaskRepository::try_new(&tx)?.remove_assignment(task_id, participant_id)?;
        tx.commit()?;
        Ok(())
    }
}

/// Loads a snapshot through `repo`, plans, and writes the new rows.
///
/// Does not open or commit a transaction; the caller owns it.
pub fn run_assignment<S, G>(
    repo: &S,
    event_id: EventId,
    selector: &TaskSelector,
    rng: &mut G,
    mode: AssignMode,
) -> Result<AssignReport, AssignError>
where
    S: ScheduleRepository + ?Sized,
    G: Rng + ?Sized,
{
    ensure_selector_scope(repo, event_id, selector)?;

    let snapshot = ScheduleSnapshot {
        tasks: repo.list_open_tasks(event_id, selector)?,
        participants: repo.list_candidate_profiles(event_id)?,
        task_type_counts: repo.task_type_counts(event_id)?,
    };
    let plan = plan_assignments(snapshot, rng, mode)?;
    repo.insert_automatic_assignments(&plan.assignments)?;

    Ok(AssignReport {
        event_id,
        assignments: plan.assignments,
        unassignable: plan.unassignable,
        tasks_examined: plan.tasks_examined,
    })
}

fn clear_in<S: ScheduleRepository + ?Sized>(
    repo: &S,
    event_id: EventId,
    task_ids: &[TaskId],
    include_manual: bool,
) -> Result<usize, AssignError> {
    if !repo.event_exists(event_id)? {
        return Err(AssignError::EventNotFound(event_id));
    }
    ensure_tasks_in_event(repo, event_id, task_ids)?;
    Ok(repo.delete_assignments(task_ids, include_manual)?)
}

fn ensure_selector_scope<S: ScheduleRepository + ?Sized>(
    repo: &S,
    event_id: EventId,
    selector: &TaskSelector,
) -> Result<(), AssignError> {
    if !repo.event_exists(event_id)? {
        return Err(AssignError::EventNotFound(event_id));
    }
    if let Some(task_type_id) = selector.task_type_id {
        match repo.task_type_event(task_type_id)? {
            Some(owner) if owner == event_id => {}
            Some(owner) => {
                return Err(AssignError::ScopeMismatch {
                    event_id,
                    details: format!("task type {task_type_id} belongs to event {owner}"),
                })
            }
            None => {
                return Err(AssignError::ScopeMismatch {
                    event_id,
                    details: format!("task type {task_type_id} does not exist"),
                })
            }
        }
    }
    if let Some(task_ids) = &selector.task_ids {
        ensure_tasks_in_event(repo, event_id, task_ids)?;
    }
    Ok(())
}

fn ensure_tasks_in_event<S: ScheduleRepository + ?Sized>(
    repo: &S,
    event_id: EventId,
    task_ids: &[TaskId],
) -> Result<(), AssignError> {
    let foreign = repo.foreign_task_ids(event_id, task_ids)?;
    if foreign.is_empty() {
        return Ok(());
    }
    let listed: Vec<String> = foreign.iter().map(ToString::to_string).collect();
    Err(AssignError::ScopeMismatch {
        event_id,
        details: format!("tasks not in event: {}", listed.join(",")),
    })
}

fn ensure_pair_in_event(
    conn: &Connection,
    event_id: EventId,
    task_id: TaskId,
    participant_id: ParticipantId,
) -> Result<(), AssignError> {
    let schedule = SqliteScheduleRepository::try_new(conn)?;
    if !schedule.event_exists(event_id)? {
        return Err(AssignError::EventNotFound(event_id));
    }
    ensure_tasks_in_event(&schedule, event_id, &[task_id])?;

    let participant = SqliteEventRepository::try_new(conn)?.get_participant(participant_id)?;
    match participant {
        Some(participant) if participant.event_id == event_id => Ok(()),
        _ => Err(AssignError::ScopeMismatch {
            event_id,
            details: format!("participant {participant_id} is not in the event"),
        }),
    }
}

fn mode_label(mode: AssignMode) -> &'static str {
    match mode {
        AssignMode::Lenient => "lenient",
        AssignMode::Strict => "strict",
    }
}
