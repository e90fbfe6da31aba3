//! Hard constraints a candidate must satisfy to take a slot.
//!
//! Evaluation is side-effect free, so the engine may re-run it for every
//! open slot and every bucket it scans.

use super::snapshot::{CandidateProfile, OpenTask, Roster};

/// First rule a candidate fails, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    /// Listed in the task's `do_not_assign_to`.
    Excluded,
    /// Already holds a slot of this task.
    AlreadyAssigned,
    /// Conflicts with a current or pending assignee, in either direction.
    Conflict,
    /// Task date outside the candidate's availability.
    OutOfRange,
    /// Candidate already works another task that day.
    Busy,
    /// Task requires tags and the candidate has none of them.
    MissingTag,
}

impl Ineligibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excluded => "excluded",
            Self::AlreadyAssigned => "already_assigned",
            Self::Conflict => "conflict",
            Self::OutOfRange => "out_of_range",
            Self::Busy => "busy",
            Self::MissingTag => "missing_tag",
        }
    }
}

/// Returns why `candidate` may not take a slot of `task`, or `None` if it may.
///
/// `task.assignees` must include assignees added earlier in the same run.
pub fn ineligibility_reason(
    task: &OpenTask,
    candidate: &CandidateProfile,
    roster: &Roster,
) -> Option<Ineligibility> {
    if task.do_not_assign_to.contains(&candidate.id) {
        return Some(Ineligibility::Excluded);
    }

    for &assignee in &task.assignees {
        if assignee == candidate.id {
            return Some(Ineligibility::AlreadyAssigned);
        }
        if candidate.do_not_assign_with.contains(&assignee) {
            return Some(Ineligibility::Conflict);
        }
        let listed_by_assignee = roster
            .get(assignee)
            .is_some_and(|other| other.do_not_assign_with.contains(&candidate.id));
        if listed_by_assignee {
            return Some(Ineligibility::Conflict);
        }
    }

    if !candidate.date_range.contains(task.date) {
        return Some(Ineligibility::OutOfRange);
    }
    if candidate.busy_dates.contains(&task.date) {
        return Some(Ineligibility::Busy);
    }
    if !task.tags.is_empty() && task.tags.is_disjoint(&candidate.tags) {
        return Some(Ineligibility::MissingTag);
    }

    None
}

pub fn is_eligible(task: &OpenTask, candidate: &CandidateProfile, roster: &Roster) -> bool {
    ineligibility_reason(task, candidate, roster).is_none()
}
