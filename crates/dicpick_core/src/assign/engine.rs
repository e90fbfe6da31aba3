//! Greedy slot-filling over a loaded snapshot.
//!
//! # Invariants
//! - Every planned assignment satisfied eligibility at the moment it was made,
//!   against all current and previously planned assignees.
//! - No task receives more assignees than `num_people`.
//! - A participant is never planned onto two tasks on the same date.

use super::eligibility::{ineligibility_reason, is_eligible};
use super::fairness::FairnessIndex;
use super::options::AssignMode;
use super::score::ScoreTracker;
use super::snapshot::{OpenTask, Roster, ScheduleSnapshot};
use super::EngineError;
use crate::model::participant::ParticipantId;
use crate::model::task::TaskId;
use log::{log_enabled, trace, warn, Level};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// One new automatic assignment decided by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlannedAssignment {
    pub task_id: TaskId,
    pub participant_id: ParticipantId,
}

/// Outcome of one engine run, before persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPlan {
    /// In the order they were made.
    pub assignments: Vec<PlannedAssignment>,
    /// Tasks left with at least one open slot.
    pub unassignable: BTreeSet<TaskId>,
    pub tasks_examined: usize,
}

/// Single-use engine owning the run's roster, fairness index and scores.
pub struct AssignmentEngine<'rng, R: Rng + ?Sized> {
    roster: Roster,
    fairness: FairnessIndex,
    scores: ScoreTracker,
    rng: &'rng mut R,
    mode: AssignMode,
}

impl<'rng, R: Rng + ?Sized> AssignmentEngine<'rng, R> {
    /// Builds the per-run indices from `snapshot`'s participants and counts.
    ///
    /// Returns the engine together with the snapshot's tasks, which are the
    /// input to [`AssignmentEngine::run`].
    pub fn new(snapshot: ScheduleSnapshot, rng: &'rng mut R, mode: AssignMode) -> (Self, Vec<OpenTask>) {
        let ScheduleSnapshot {
            participants,
            tasks,
            task_type_counts,
        } = snapshot;

        let scores = ScoreTracker::initialize(&participants);
        let roster = Roster::new(participants);
        let task_types: HashSet<_> = tasks.iter().map(|task| task.task_type_id).collect();
        let fairness = FairnessIndex::initialize(task_types, &roster.ids(), &task_type_counts);

        (
            Self {
                roster,
                fairness,
                scores,
                rng,
                mode,
            },
            tasks,
        )
    }

    /// Fills as many open slots as possible.
    ///
    /// Tasks are processed by task type name, then date, then id, so a seeded
    /// run over the same snapshot always yields the same plan.
    pub fn run(mut self, mut tasks: Vec<OpenTask>) -> Result<AssignmentPlan, EngineError> {
        tasks.sort_by(|a, b| {
            a.task_type_name
                .cmp(&b.task_type_name)
                .then(a.date.cmp(&b.date))
                .then(a.id.cmp(&b.id))
        });

        let mut plan = AssignmentPlan {
            tasks_examined: tasks.len(),
            ..AssignmentPlan::default()
        };

        for mut task in tasks {
            while !task.is_full() {
                let Some(chosen) = self.pick_candidate(&task) else {
                    if self.mode == AssignMode::Strict {
                        return Err(EngineError::NoEligibleParticipant {
                            task_id: task.id,
                            task_type_id: task.task_type_id,
                            date: task.date,
                        });
                    }
                    warn!(
                        "event=task_unassignable module=assign task_id={} task_type={} date={} filled={} needed={}",
                        task.id,
                        task.task_type_name,
                        task.date,
                        task.assignees.len(),
                        task.num_people
                    );
                    plan.unassignable.insert(task.id);
                    break;
                };
                self.commit(&mut task, chosen)?;
                plan.assignments.push(PlannedAssignment {
                    task_id: task.id,
                    participant_id: chosen,
                });
            }
        }

        Ok(plan)
    }

    fn pick_candidate(&mut self, task: &OpenTask) -> Option<ParticipantId> {
        for (count, pool) in self.fairness.candidates_by_count(task.task_type_id) {
            let mut eligible: Vec<ParticipantId> = pool
                .iter()
                .copied()
                .filter(|id| self.candidate_is_eligible(task, *id))
                .collect();
            if eligible.is_empty() {
                continue;
            }
            // Pools are hash sets; sort so the seeded draw is reproducible.
            eligible.sort_unstable();
            let lowest = self.scores.lowest_among(&eligible);
            let chosen = lowest.choose(&mut *self.rng).copied();
            trace!(
                "event=candidate_pick module=assign task_id={} bucket={} eligible={} tied={}",
                task.id,
                count,
                eligible.len(),
                lowest.len()
            );
            return chosen;
        }
        None
    }

    fn candidate_is_eligible(&self, task: &OpenTask, participant_id: ParticipantId) -> bool {
        let Some(profile) = self.roster.get(participant_id) else {
            return false;
        };
        if log_enabled!(Level::Trace) {
            if let Some(reason) = ineligibility_reason(task, profile, &self.roster) {
                trace!(
                    "event=candidate_rejected module=assign task_id={} participant_id={} reason={}",
                    task.id,
                    participant_id,
                    reason.as_str()
                );
                return false;
            }
            return true;
        }
        is_eligible(task, profile, &self.roster)
    }

    fn commit(&mut self, task: &mut OpenTask, participant_id: ParticipantId) -> Result<(), EngineError> {
        if !self.roster.mark_busy(participant_id, task.date) {
            return Err(EngineError::UntrackedParticipant {
                task_type_id: task.task_type_id,
                participant_id,
            });
        }
        self.fairness.promote(task.task_type_id, participant_id)?;
        self.scores.credit(participant_id, task.score);
        task.assignees.push(participant_id);
        Ok(())
    }
}

/// Runs one engine pass over `snapshot`.
pub fn plan_assignments<R: Rng + ?Sized>(
    snapshot: ScheduleSnapshot,
    rng: &mut R,
    mode: AssignMode,
) -> Result<AssignmentPlan, EngineError> {
    let (engine, tasks) = AssignmentEngine::new(snapshot, rng, mode);
    engine.run(tasks)
}

#[cfg(test)]
mod tests {
    use super::{plan_assignments, AssignmentEngine};
    use crate::assign::options::AssignMode;
    use crate::assign::snapshot::{CandidateProfile, OpenTask, ScheduleSnapshot, TaskTypeCount};
    use crate::assign::EngineError;
    use crate::model::date_range::DateRange;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{BTreeSet, HashMap, HashSet};
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 8, d).unwrap()
    }

    fn person(score: i64) -> CandidateProfile {
        CandidateProfile {
            id: Uuid::new_v4(),
            date_range: DateRange::new(day(1), day(31)).unwrap(),
            tags: BTreeSet::new(),
            do_not_assign_with: BTreeSet::new(),
            busy_dates: HashSet::new(),
            assigned_score: score,
        }
    }

    fn task(task_type_id: Uuid, name: &str, date: NaiveDate, num_people: u32) -> OpenTask {
        OpenTask {
            id: Uuid::new_v4(),
            task_type_id,
            task_type_name: name.to_string(),
            date,
            num_people,
            score: 1,
            tags: BTreeSet::new(),
            do_not_assign_to: BTreeSet::new(),
            assignees: Vec::new(),
        }
    }

    #[test]
    fn fills_every_slot_and_spreads_one_type_across_participants() {
        let cook = Uuid::new_v4();
        let (a, b) = (person(0), person(0));
        let snapshot = ScheduleSnapshot {
            participants: vec![a.clone(), b.clone()],
            tasks: vec![
                task(cook, "Cook", day(1), 1),
                task(cook, "Cook", day(2), 1),
                task(cook, "Cook", day(3), 1),
            ],
            task_type_counts: Vec::new(),
        };

        let mut rng = StdRng::seed_from_u64(7);
        let plan = plan_assignments(snapshot, &mut rng, AssignMode::Lenient).unwrap();

        assert!(plan.unassignable.is_empty());
        assert_eq!(plan.assignments.len(), 3);
        let mut per_person: HashMap<Uuid, usize> = HashMap::new();
        for assignment in &plan.assignments {
            *per_person.entry(assignment.participant_id).or_default() += 1;
        }
        assert_eq!(per_person.len(), 2);
        assert!(per_person.values().all(|n| (1..=2).contains(n)));
    }

    #[test]
    fn lower_bucket_wins_over_lower_score() {
        let cook = Uuid::new_v4();
        let veteran = person(0);
        let newcomer = person(100);
        let snapshot = ScheduleSnapshot {
            participants: vec![veteran.clone(), newcomer.clone()],
            tasks: vec![task(cook, "Cook", day(5), 1)],
            task_type_counts: vec![TaskTypeCount {
                participant_id: veteran.id,
                task_type_id: cook,
                count: 1,
            }],
        };

        let mut rng = StdRng::seed_from_u64(1);
        let plan = plan_assignments(snapshot, &mut rng, AssignMode::Lenient).unwrap();
        assert_eq!(plan.assignments[0].participant_id, newcomer.id);
    }

    #[test]
    fn lowest_score_wins_within_a_bucket() {
        let cook = Uuid::new_v4();
        let rich = person(10);
        let poor = person(2);
        let snapshot = ScheduleSnapshot {
            participants: vec![rich.clone(), poor.clone()],
            tasks: vec![task(cook, "Cook", day(5), 1)],
            task_type_counts: Vec::new(),
        };

        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_assignments(snapshot.clone(), &mut rng, AssignMode::Lenient).unwrap();
            assert_eq!(plan.assignments[0].participant_id, poor.id);
        }
    }

    #[test]
    fn same_seed_gives_same_plan() {
        let cook = Uuid::new_v4();
        let clean = Uuid::new_v4();
        let participants: Vec<_> = (0..6).map(|_| person(0)).collect();
        let tasks: Vec<_> = (1..=5)
            .flat_map(|d| [task(cook, "Cook", day(d), 2), task(clean, "Clean", day(d), 1)])
            .collect();
        let snapshot = ScheduleSnapshot {
            participants,
            tasks,
            task_type_counts: Vec::new(),
        };

        let first = plan_assignments(
            snapshot.clone(),
            &mut StdRng::seed_from_u64(42),
            AssignMode::Lenient,
        )
        .unwrap();
        let second =
            plan_assignments(snapshot, &mut StdRng::seed_from_u64(42), AssignMode::Lenient)
                .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn strict_mode_reports_the_unfillable_task() {
        let cook = Uuid::new_v4();
        let only = person(0);
        let lonely = task(cook, "Cook", day(3), 2);
        let lonely_id = lonely.id;
        let snapshot = ScheduleSnapshot {
            participants: vec![only],
            tasks: vec![lonely],
            task_type_counts: Vec::new(),
        };

        let err = plan_assignments(snapshot, &mut StdRng::seed_from_u64(3), AssignMode::Strict)
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::NoEligibleParticipant {
                task_id: lonely_id,
                task_type_id: cook,
                date: day(3),
            }
        );
    }

    #[test]
    fn committing_an_unknown_participant_is_an_error() {
        let cook = Uuid::new_v4();
        let mut open = task(cook, "Cook", day(2), 1);
        let snapshot = ScheduleSnapshot {
            participants: vec![person(0)],
            tasks: vec![open.clone()],
            task_type_counts: Vec::new(),
        };
        let stranger = Uuid::new_v4();

        let mut rng = StdRng::seed_from_u64(5);
        let (mut engine, _) = AssignmentEngine::new(snapshot, &mut rng, AssignMode::Lenient);
        assert_eq!(
            engine.commit(&mut open, stranger),
            Err(EngineError::UntrackedParticipant {
                task_type_id: cook,
                participant_id: stranger,
            })
        );
        assert!(open.assignees.is_empty());
    }

    #[test]
    fn lenient_mode_keeps_partial_fill_and_moves_on() {
        let cook = Uuid::new_v4();
        let only = person(0);
        let short = task(cook, "Cook", day(3), 2);
        let next = task(cook, "Cook", day(4), 1);
        let short_id = short.id;
        let snapshot = ScheduleSnapshot {
            participants: vec![only.clone()],
            tasks: vec![short, next],
            task_type_counts: Vec::new(),
        };

        let plan =
            plan_assignments(snapshot, &mut StdRng::seed_from_u64(3), AssignMode::Lenient).unwrap();
        assert_eq!(plan.unassignable, BTreeSet::from([short_id]));
        assert_eq!(plan.assignments.len(), 2);
        assert_eq!(plan.tasks_examined, 2);
    }
}
