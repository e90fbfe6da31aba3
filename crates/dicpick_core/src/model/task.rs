//! Task instances and their assignments.
//!
//! # Invariants
//! - Exactly one task exists per `(task_type_id, date)`.
//! - `assignees.len() <= num_people` for every persisted task.

use super::event::TagId;
use super::participant::ParticipantId;
use super::task_type::TaskTypeId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub type TaskId = uuid::Uuid;

/// One participant holding one slot of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub participant_id: ParticipantId,
    pub task_id: TaskId,
    /// `true` for engine-made rows, which a later run or clear may discard.
    pub automatic: bool,
}

/// One instance of a task type on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type_id: TaskTypeId,
    pub date: NaiveDate,
    pub num_people: u32,
    pub score: i64,
    /// Empty means any participant qualifies.
    pub tags: BTreeSet<TagId>,
    pub do_not_assign_to: BTreeSet<ParticipantId>,
    pub assignees: Vec<Assignment>,
}

impl Task {
    /// Number of slots still open.
    pub fn open_slots(&self) -> u32 {
        let filled = u32::try_from(self.assignees.len()).unwrap_or(u32::MAX);
        self.num_people.saturating_sub(filled)
    }

    pub fn is_full(&self) -> bool {
        self.open_slots() == 0
    }

    pub fn has_assignee(&self, participant_id: ParticipantId) -> bool {
        self.assignees
            .iter()
            .any(|assignment| assignment.participant_id == participant_id)
    }
}
