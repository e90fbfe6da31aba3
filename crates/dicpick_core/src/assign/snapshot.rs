//! Read model the engine runs against.
//!
//! A snapshot is loaded once per run, inside the run's transaction, and then
//! mutated only by the engine that owns it.

use crate::model::date_range::DateRange;
use crate::model::event::TagId;
use crate::model::participant::ParticipantId;
use crate::model::task::TaskId;
use crate::model::task_type::TaskTypeId;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Participant as seen by the engine, with derived fields precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateProfile {
    pub id: ParticipantId,
    pub date_range: DateRange,
    pub tags: BTreeSet<TagId>,
    pub do_not_assign_with: BTreeSet<ParticipantId>,
    /// Dates this participant already works, on any task type.
    pub busy_dates: HashSet<NaiveDate>,
    /// `initial_score` plus the score of every task currently assigned.
    pub assigned_score: i64,
}

/// Task with at least one open slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTask {
    pub id: TaskId,
    pub task_type_id: TaskTypeId,
    pub task_type_name: String,
    pub date: NaiveDate,
    pub num_people: u32,
    pub score: i64,
    pub tags: BTreeSet<TagId>,
    pub do_not_assign_to: BTreeSet<ParticipantId>,
    /// Current assignees, manual and automatic, plus any added during the run.
    pub assignees: Vec<ParticipantId>,
}

impl OpenTask {
    pub fn is_full(&self) -> bool {
        self.assignees.len() >= self.num_people as usize
    }
}

/// How many tasks of one type a participant already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTypeCount {
    pub participant_id: ParticipantId,
    pub task_type_id: TaskTypeId,
    pub count: u32,
}

/// Everything one run needs, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct ScheduleSnapshot {
    pub participants: Vec<CandidateProfile>,
    pub tasks: Vec<OpenTask>,
    pub task_type_counts: Vec<TaskTypeCount>,
}

/// Participant lookup used by eligibility checks.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    by_id: HashMap<ParticipantId, CandidateProfile>,
}

impl Roster {
    pub fn new(participants: impl IntoIterator<Item = CandidateProfile>) -> Self {
        Self {
            by_id: participants
                .into_iter()
                .map(|profile| (profile.id, profile))
                .collect(),
        }
    }

    pub fn get(&self, id: ParticipantId) -> Option<&CandidateProfile> {
        self.by_id.get(&id)
    }

    /// Participant ids in ascending order.
    pub fn ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<_> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Claims `date` for `id`. Returns `false` when the participant is unknown.
    pub fn mark_busy(&mut self, id: ParticipantId, date: NaiveDate) -> bool {
        match self.by_id.get_mut(&id) {
            Some(profile) => {
                profile.busy_dates.insert(date);
                true
            }
            None => false,
        }
    }
}
