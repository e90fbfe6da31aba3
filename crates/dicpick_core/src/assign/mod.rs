//! Automatic assignment engine.
//!
//! # Responsibility
//! - Match participants to open task slots under hard eligibility rules.
//! - Spread task types across participants first, then spread score.
//!
//! # Invariants
//! - Everything here is in-memory and storage-agnostic; loading the
//!   snapshot and persisting the plan belong to `service::assignment_service`.
//! - One engine instance serves exactly one run; its indices are never shared.

use crate::model::participant::ParticipantId;
use crate::model::task::TaskId;
use crate::model::task_type::TaskTypeId;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod eligibility;
pub mod engine;
pub mod fairness;
pub mod options;
pub mod score;
pub mod snapshot;

/// Errors that stop an engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Strict mode only: a slot had no eligible candidate.
    NoEligibleParticipant {
        task_id: TaskId,
        task_type_id: TaskTypeId,
        date: NaiveDate,
    },
    /// Bookkeeping referenced a participant this run does not track.
    UntrackedParticipant {
        task_type_id: TaskTypeId,
        participant_id: ParticipantId,
    },
}

impl Display for EngineError {
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
            Self::UntrackedParticipant {
                task_type_id,
                participant_id,
            } => write!(
                f,
                "inconsistent run state: participant {participant_id} is not tracked for task type {task_type_id}"
            ),
        }
    }
}

impl Error for EngineError {}
